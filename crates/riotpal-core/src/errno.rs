//! Device error codes
//!
//! The firmware reports failures as POSIX errno values. They are rendered
//! with the host's errno table as `NAME-description [code]`.

/// Render an error code as `NAME-description [code]`
///
/// Returns `None` for codes the platform does not know.
#[cfg(unix)]
pub fn describe(code: u64) -> Option<String> {
    use nix::errno::Errno;

    let raw = i32::try_from(code).ok()?;
    match Errno::from_raw(raw) {
        Errno::UnknownErrno => None,
        errno => Some(format!("{:?}-{} [{}]", errno, errno.desc(), code)),
    }
}

/// Render an error code
///
/// Without a platform errno table every code is unknown.
#[cfg(not(unix))]
pub fn describe(_code: u64) -> Option<String> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_describe_eio() {
        let msg = describe(5).unwrap();
        assert_eq!(msg, format!("EIO-{} [5]", Errno::EIO.desc()));
    }

    #[test]
    fn test_follows_platform_numbering() {
        let code = Errno::EAGAIN as i32 as u64;
        let msg = describe(code).unwrap();
        assert!(msg.starts_with("EAGAIN-"));
        assert!(msg.ends_with(&format!("[{}]", code)));
    }

    #[test]
    fn test_unknown_code() {
        assert!(describe(0).is_none());
        assert!(describe(4096).is_none());
        assert!(describe(u64::MAX).is_none());
    }
}
