// Host side of the print facility. Generated routines call reactor_print with a
// NUL-terminated format string and a buffer of 64-bit argument slots. The format language
// is a small printf subset: %d (signed), %u (unsigned), %x (hex), %f (f32 in the low half
// of the slot), %p (address), %s (address of a NUL-terminated string) and %%. Output goes
// to stdout unless the calling thread is inside capture, in which case it is appended to
// the capture buffer instead.

use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::fmt::Write as _;
use std::io::Write as _;

thread_local! {
    static CAPTURE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Run `f` and return what routines printed on this thread meanwhile.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, String) {
    let previous = CAPTURE.with(|c| c.borrow_mut().replace(String::new()));
    let result = f();
    let captured = CAPTURE.with(|c| std::mem::replace(&mut *c.borrow_mut(), previous));
    (result, captured.unwrap_or_default())
}

fn emit(text: &str) {
    let captured = CAPTURE.with(|c| match c.borrow_mut().as_mut() {
        Some(buffer) => {
            buffer.push_str(text);
            true
        }
        None => false,
    });
    if !captured {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Expand `format` with the argument slots `args`.
///
/// Missing arguments print as `<?>`; unknown conversions are copied through.
pub fn format_slots(format: &str, args: &[u64]) -> String {
    let mut out = String::with_capacity(format.len() + args.len() * 8);
    let mut args = args.iter().copied();
    let mut chars = format.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let Some(conversion) = chars.next() else {
            out.push('%');
            break;
        };
        if conversion == '%' {
            out.push('%');
            continue;
        }
        if !matches!(conversion, 'd' | 'u' | 'x' | 'f' | 'p' | 's') {
            out.push('%');
            out.push(conversion);
            continue;
        }
        let Some(slot) = args.next() else {
            out.push_str("<?>");
            continue;
        };
        let _ = match conversion {
            'd' => write!(out, "{}", slot as i64),
            'u' => write!(out, "{}", slot),
            'x' => write!(out, "{:x}", slot),
            'f' => write!(out, "{:.6}", f32::from_bits(slot as u32)),
            'p' => write!(out, "{:#x}", slot),
            _ => write_c_string(&mut out, slot),
        };
    }
    out
}

fn write_c_string(out: &mut String, address: u64) -> std::fmt::Result {
    if address == 0 {
        out.push_str("(null)");
        return Ok(());
    }
    // SAFETY: %s slots are filled by generated code with addresses of
    // NUL-terminated strings owned by the routine or the host.
    let text = unsafe { CStr::from_ptr(address as usize as *const c_char) };
    out.push_str(&text.to_string_lossy());
    Ok(())
}

/// Half to float conversion for printed `Half` values.
pub(crate) extern "C" fn reactor_half_to_float(bits: u16) -> f32 {
    crate::expr::cast::half_bits_to_f32(bits)
}

/// Entry point called from generated code.
///
/// # Safety
///
/// `format` must be a NUL-terminated string and `args` must point at `count` slots.
pub unsafe extern "C" fn reactor_print(format: *const u8, args: *const u64, count: u32) {
    let format = CStr::from_ptr(format as *const c_char).to_string_lossy();
    let args = if count == 0 || args.is_null() {
        &[][..]
    } else {
        std::slice::from_raw_parts(args, count as usize)
    };
    emit(&format_slots(&format, args));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let args = [(-5i64) as u64, 7, 255, 1.5f32.to_bits() as u64];
        assert_eq!(format_slots("%d %u %x %f", &args), "-5 7 ff 1.500000");
        assert_eq!(format_slots("100%% %d", &[3]), "100% 3");
        assert_eq!(format_slots("%d %d", &[1]), "1 <?>");
        assert_eq!(format_slots("%q", &[]), "%q");
    }

    #[test]
    fn test_strings() {
        let text = b"hi\0";
        let args = [text.as_ptr() as u64, 0];
        assert_eq!(format_slots("%s %s", &args), "hi (null)");
    }

    #[test]
    fn test_capture_nests() {
        let ((), outer) = capture(|| {
            emit("a");
            let ((), inner) = capture(|| emit("b"));
            assert_eq!(inner, "b");
            emit("c");
        });
        assert_eq!(outer, "ac");
    }
}
