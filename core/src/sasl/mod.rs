/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, a multi-transport message exchange library.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! SASL client for SMTP and IMAP authentication: PLAIN, LOGIN, CRAM-MD5, SCRAM-SHA-256.
//!
//! - `initial_client_response` builds the first send for a mechanism
//! - `respond_to_challenge` answers a server challenge (CRAM-MD5, SCRAM-SHA-256)
//! - `login_respond_to_challenge` answers the LOGIN username/password prompts
//!
//! Payloads are raw bytes; callers base64-encode them for the wire.

mod mechanism;
mod scram;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;
use thiserror::Error;

pub use mechanism::SaslMechanism;
pub use scram::{client_final as scram_sha256_client_final, client_first as scram_sha256_client_first, ScramSha256State};

type HmacMd5 = Hmac<Md5>;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SaslError {
    pub message: String,
}

impl SaslError {
    pub fn invalid(msg: &str) -> Self {
        Self { message: msg.to_string() }
    }
}

/// Result of the first client step: either done (PLAIN) or continue with SCRAM state.
#[derive(Debug)]
pub enum SaslFirst {
    /// Single-round (or server-prompted): send this as initial response.
    Done(Vec<u8>),
    /// SCRAM: send this as initial response, then use state in respond_to_challenge.
    ScramContinue(Vec<u8>, ScramSha256State),
}

/// PLAIN payload: authzid NUL authcid NUL password.
pub fn encode_plain(authzid: &str, authcid: &str, password: &str) -> Vec<u8> {
    format!("{}\0{}\0{}", authzid, authcid, password).into_bytes()
}

/// Build the initial client response for the given mechanism.
pub fn initial_client_response(
    mechanism: SaslMechanism,
    authzid: &str,
    authcid: &str,
    password: &str,
) -> Result<SaslFirst, SaslError> {
    match mechanism {
        SaslMechanism::Plain => Ok(SaslFirst::Done(encode_plain(authzid, authcid, password))),
        SaslMechanism::Login | SaslMechanism::CramMd5 => Ok(SaslFirst::Done(vec![])),
        SaslMechanism::ScramSha256 => {
            let (bytes, state) = scram_sha256_client_first(authcid);
            Ok(SaslFirst::ScramContinue(bytes, state))
        }
    }
}

/// Respond to a server challenge. For SCRAM pass the state from `initial_client_response`.
pub fn respond_to_challenge(
    mechanism: SaslMechanism,
    challenge_b64: &str,
    authcid: &str,
    password: &str,
    scram_state: Option<&ScramSha256State>,
) -> Result<Vec<u8>, SaslError> {
    match mechanism {
        SaslMechanism::CramMd5 => cram_md5_response(authcid, password, challenge_b64),
        SaslMechanism::ScramSha256 => {
            let state = scram_state
                .ok_or_else(|| SaslError::invalid("SCRAM-SHA-256 requires state from initial_client_response"))?;
            scram_sha256_client_final(state, challenge_b64, password)
        }
        SaslMechanism::Login => login_respond_to_challenge(challenge_b64, authcid, password),
        SaslMechanism::Plain => Err(SaslError::invalid("PLAIN does not use respond_to_challenge")),
    }
}

/// LOGIN: first challenge is "Username:", second is "Password:".
pub fn login_respond_to_challenge(challenge_b64: &str, authcid: &str, password: &str) -> Result<Vec<u8>, SaslError> {
    let decoded = STANDARD
        .decode(challenge_b64.trim())
        .map_err(|_| SaslError::invalid("invalid base64"))?;
    let s = String::from_utf8_lossy(&decoded).to_lowercase();
    if s.contains("username") {
        Ok(authcid.as_bytes().to_vec())
    } else if s.contains("password") {
        Ok(password.as_bytes().to_vec())
    } else {
        Err(SaslError::invalid("unexpected LOGIN challenge"))
    }
}

fn cram_md5_response(authcid: &str, password: &str, challenge_b64: &str) -> Result<Vec<u8>, SaslError> {
    let challenge = STANDARD
        .decode(challenge_b64.trim())
        .map_err(|_| SaslError::invalid("invalid base64"))?;
    let mut mac = HmacMd5::new_from_slice(password.as_bytes()).map_err(|_| SaslError::invalid("HMAC key length"))?;
    mac.update(&challenge);
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(format!("{} {}", authcid, hex).into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cram_md5_matches_rfc2195_example() {
        let challenge = STANDARD.encode("<1896.697170952@postoffice.reston.mci.net>");
        let out = respond_to_challenge(SaslMechanism::CramMd5, &challenge, "tim", "tanstaaftanstaaf", None).unwrap();
        assert_eq!(out, b"tim b913a602c7eda7a495b4e6e7334d3890".to_vec());
    }

    #[test]
    fn login_answers_prompts() {
        let user = STANDARD.encode("Username:");
        let pass = STANDARD.encode("Password:");
        assert_eq!(login_respond_to_challenge(&user, "svc", "pw").unwrap(), b"svc");
        assert_eq!(login_respond_to_challenge(&pass, "svc", "pw").unwrap(), b"pw");
    }

    #[test]
    fn plain_payload_layout() {
        assert_eq!(encode_plain("", "svc", "pw"), b"\0svc\0pw".to_vec());
        assert_eq!(encode_plain("admin", "svc", "pw"), b"admin\0svc\0pw".to_vec());
    }
}
