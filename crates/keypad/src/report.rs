//! Raw input report decoding.
//!
//! The keypad sends one input report per key state change. Byte 3 carries the
//! key code and byte 4 the state: `0` while the key is held, anything else
//! once it is let go. Everything else in the report is padding.

use keycode::{KeyCode, Transition};

use crate::{Error, Result};

/// Offset of the key code within a report.
const KEY_OFFSET: usize = 3;
/// Offset of the key state within a report.
const STATE_OFFSET: usize = 4;

/// Smallest report that still carries both the key code and the state.
pub const REPORT_LEN_MIN: usize = STATE_OFFSET + 1;
/// Largest report the keypad sends.
pub const REPORT_LEN_MAX: usize = 16;

/// Decode a raw report into a key code and transition.
pub fn decode(report: &[u8]) -> Result<(KeyCode, Transition)> {
    if !(REPORT_LEN_MIN..=REPORT_LEN_MAX).contains(&report.len()) {
        return Err(Error::ReportLength {
            len: report.len(),
            min: REPORT_LEN_MIN,
            max: REPORT_LEN_MAX,
        });
    }
    let transition = if report[STATE_OFFSET] == 0 {
        Transition::Pressed
    } else {
        Transition::Released
    };
    Ok((report[KEY_OFFSET], transition))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn decodes_press_and_release() {
        let down = [0x01, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x00];
        let up = [0x01, 0x00, 0x00, 0x07, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(decode(&down).unwrap(), (7, Transition::Pressed));
        assert_eq!(decode(&up).unwrap(), (7, Transition::Released));
    }

    #[test]
    fn any_nonzero_state_is_release() {
        let r = [0, 0, 0, 2, 0xff];
        assert_eq!(decode(&r).unwrap(), (2, Transition::Released));
    }

    #[test]
    fn short_report_is_rejected() {
        let err = decode(&[0, 0, 0, 3]).unwrap_err();
        assert!(matches!(err, Error::ReportLength { len: 4, .. }));
    }

    #[test]
    fn oversized_report_is_rejected() {
        let err = decode(&[0u8; REPORT_LEN_MAX + 1]).unwrap_err();
        assert!(matches!(err, Error::ReportLength { len: 17, .. }));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let res = decode(&bytes);
            let in_range = (REPORT_LEN_MIN..=REPORT_LEN_MAX).contains(&bytes.len());
            prop_assert_eq!(res.is_ok(), in_range);
            if let Ok((code, _)) = res {
                prop_assert_eq!(code, bytes[KEY_OFFSET]);
            }
        }
    }
}
