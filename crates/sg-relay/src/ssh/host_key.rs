//! Host key acceptance

use russh_keys::key::PublicKey;

use sg_core::config::HostKeyPolicy;
use sg_core::TargetHost;

/// Decide whether `key`, presented by `target`, satisfies `policy`.
///
/// Returns the reason on rejection.
pub fn verify_host_key(
    policy: &HostKeyPolicy,
    target: &TargetHost,
    key: &PublicKey,
) -> Result<(), String> {
    let fingerprint = key.fingerprint();

    match policy {
        HostKeyPolicy::TrustAlways => {
            tracing::warn!(
                "Accepting unverified host key SHA256:{} for {} (trust-always)",
                fingerprint,
                target
            );
            Ok(())
        }
        HostKeyPolicy::Pinned { fingerprint: expected } => {
            if fingerprints_match(expected, &fingerprint) {
                tracing::debug!("Host key for {} matches pinned fingerprint", target);
                Ok(())
            } else {
                Err(format!(
                    "{} presented SHA256:{}, expected {}",
                    target, fingerprint, expected
                ))
            }
        }
        HostKeyPolicy::KnownHosts { path } => {
            match russh_keys::check_known_hosts_path(target.host(), target.port(), key, path) {
                Ok(true) => {
                    tracing::debug!("Host key for {} found in {}", target, path.display());
                    Ok(())
                }
                Ok(false) => Err(format!(
                    "{} is not listed in {}",
                    target,
                    path.display()
                )),
                Err(e) => Err(format!(
                    "{} did not match {}: {}",
                    target,
                    path.display(),
                    e
                )),
            }
        }
    }
}

/// Compare fingerprints, ignoring a `SHA256:` prefix and base64 padding
fn fingerprints_match(expected: &str, actual: &str) -> bool {
    fn normalize(fp: &str) -> &str {
        let fp = fp.trim();
        fp.strip_prefix("SHA256:").unwrap_or(fp).trim_end_matches('=')
    }
    normalize(expected) == normalize(actual)
}
