/*
 * scram.rs
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

//! SCRAM-SHA-256 SASL client (RFC 5802, 7677).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::SaslError;

type HmacSha256 = Hmac<Sha256>;

/// State carried between client-first and client-final.
#[derive(Clone, Debug)]
pub struct ScramSha256State {
    pub(crate) client_nonce: String,
    pub(crate) gs2_header: String,
    pub(crate) client_first_bare: String,
}

/// Build client-first-message and state. gs2-header is "n,," (no channel binding, no authzid).
pub fn client_first(authcid: &str) -> (Vec<u8>, ScramSha256State) {
    let nonce = generate_nonce();
    let gs2_header = "n,,";
    let client_first_bare = format!("n={},r={}", sasl_name(authcid), nonce);
    let message = format!("{}{}", gs2_header, client_first_bare);
    let state = ScramSha256State {
        client_nonce: nonce,
        gs2_header: gs2_header.to_string(),
        client_first_bare,
    };
    (message.into_bytes(), state)
}

/// Build client-final-message from the base64 server-first and the password.
pub fn client_final(
    state: &ScramSha256State,
    server_first_b64: &str,
    password: &str,
) -> Result<Vec<u8>, SaslError> {
    let server_first = STANDARD
        .decode(server_first_b64.trim())
        .map_err(|_| SaslError::invalid("invalid base64"))?;
    let server_first = String::from_utf8(server_first).map_err(|_| SaslError::invalid("server-first not UTF-8"))?;
    let (nonce, salt_b64, iter_str) = parse_server_first(&server_first)?;
    if !nonce.starts_with(&state.client_nonce) {
        return Err(SaslError::invalid("server nonce must extend client nonce"));
    }
    let salt = STANDARD
        .decode(salt_b64.as_bytes())
        .map_err(|_| SaslError::invalid("invalid salt base64"))?;
    let iterations: u32 = iter_str.parse().map_err(|_| SaslError::invalid("invalid iteration count"))?;

    let mut salted_password = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut salted_password);
    let client_key = hmac(&salted_password, b"Client Key")?;
    let stored_key = Sha256::digest(&client_key);

    let client_final_no_proof = format!("c={},r={}", STANDARD.encode(state.gs2_header.as_bytes()), nonce);
    let auth_message = format!("{},{},{}", state.client_first_bare, server_first, client_final_no_proof);
    let client_signature = hmac(&stored_key, auth_message.as_bytes())?;
    let client_proof: Vec<u8> = client_key
        .iter()
        .zip(client_signature.iter())
        .map(|(x, y)| x ^ y)
        .collect();
    Ok(format!("{},p={}", client_final_no_proof, STANDARD.encode(client_proof)).into_bytes())
}

fn generate_nonce() -> String {
    let mut raw = [0u8; 18];
    rand::thread_rng().fill_bytes(&mut raw);
    STANDARD.encode(raw)
}

fn sasl_name(s: &str) -> String {
    s.replace('=', "=3D").replace(',', "=2C")
}

fn parse_server_first(input: &str) -> Result<(String, String, String), SaslError> {
    let mut r = None;
    let mut s = None;
    let mut i = None;
    for part in input.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("r=") {
            r = Some(v.to_string());
        } else if let Some(v) = part.strip_prefix("s=") {
            s = Some(v.to_string());
        } else if let Some(v) = part.strip_prefix("i=") {
            i = Some(v.to_string());
        }
    }
    let r = r.ok_or_else(|| SaslError::invalid("missing r in server-first"))?;
    let s = s.ok_or_else(|| SaslError::invalid("missing s in server-first"))?;
    let i = i.ok_or_else(|| SaslError::invalid("missing i in server-first"))?;
    Ok((r, s, i))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SaslError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SaslError::invalid("HMAC key length"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_first_has_gs2_header_and_nonce() {
        let (msg, state) = client_first("svc,user");
        let msg = String::from_utf8(msg).unwrap();
        assert!(msg.starts_with("n,,n=svc=2Cuser,r="));
        assert!(msg.ends_with(&state.client_nonce));
    }

    #[test]
    fn rejects_foreign_server_nonce() {
        let (_, state) = client_first("u");
        let server_first = STANDARD.encode("r=other,s=c2FsdA==,i=4096");
        assert!(client_final(&state, &server_first, "pw").is_err());
    }

    #[test]
    fn final_message_carries_proof() {
        let (_, state) = client_first("u");
        let server_first = STANDARD.encode(format!("r={}srv,s=c2FsdA==,i=16", state.client_nonce));
        let out = String::from_utf8(client_final(&state, &server_first, "pw").unwrap()).unwrap();
        assert!(out.starts_with("c=biws,r="));
        assert!(out.contains(",p="));
    }
}
