//! Canonicalization of configuration values which have more than one valid
//! spelling.

use std::net::IpAddr;

use tracing::debug;

use crate::apis::internal;

/// Lowercases every DNS name in a list of Subject Alternative Names.
///
/// IP literals are left untouched, since IPv6 addresses are case-insensitive
/// already and should keep the spelling they were configured with. The order
/// and length of the list never change.
pub fn normalize_sans(sans: &mut [String]) {
    for san in sans {
        if san.parse::<IpAddr>().is_ok() {
            continue;
        }

        if san.chars().any(char::is_uppercase) {
            *san = san.to_lowercase();
        }
    }
}

/// Applies all normalization rules to `config`.
pub fn normalize(config: &mut internal::MasterConfiguration) {
    normalize_sans(&mut config.api_server_cert_sans);

    if let Some(local) = &mut config.etcd.local {
        normalize_sans(&mut local.server_cert_sans);
        normalize_sans(&mut local.peer_cert_sans);
    }

    debug!("normalized configuration");
}
