//! Random identities for viewers
//!
//! Every session picks fresh values, so tabs and reloads never share a peer id.

use tracing::warn;

/// Eight lowercase hex chars for the viewer peer id
pub fn random_suffix() -> String {
    random_bytes::<4>().iter().map(|b| format!("{b:02x}")).collect()
}

/// Anonymous chat identity, `Guest-0000` .. `Guest-9999`
pub fn guest_username() -> String {
    let n = u16::from_le_bytes(random_bytes::<2>()) % 10_000;
    format!("Guest-{n:04}")
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    if let Err(e) = getrandom::getrandom(&mut buf) {
        // Fall back to clock entropy; uniqueness is best-effort anyway
        warn!(error = %e, "OS randomness unavailable");
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default()
            .to_le_bytes();
        for (i, b) in buf.iter_mut().enumerate() {
            *b = nanos[i % nanos.len()];
        }
    }
    buf
}
