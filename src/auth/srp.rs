//! Secure Remote Password plugins (`Srp`, `Srp256`)
//!
//! Both plugins share the group parameters and session key derivation of
//! the Firebird SRP-6a variant. They differ only in the hash of the client
//! proof: SHA-1 for `Srp`, SHA-256 for `Srp256`.

use super::plugin::{AuthCredentials, AuthStatus, AuthenticationPlugin, AuthenticationPluginSpi};
use crate::{Error, Result};
use num_bigint::BigUint;
use rand::RngCore;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::sync::OnceLock;

/// `Srp` plugin name
pub const SRP_NAME: &str = "Srp";

/// `Srp256` plugin name
pub const SRP256_NAME: &str = "Srp256";

/// Byte size of the key material used in hashes
const SRP_KEY_SIZE: usize = 128;

/// Bit size of the client private key
const SRP_PRIVATE_KEY_BITS: usize = 128;

const PRIME_HEX: &[u8] = b"E67D2E994B2F900C3F41F08F5BB2627ED0D49EE1FE767A52EFCD565CD6E768812C3E1E9CE8F0A8BEA6CB13CD29DDEBF7A96D4A93B55D488DF099A15C89DCB0640738EB2CBDD9A8F7BAB561AB1B0DC1C6CDABF303264A08D1BCA932D1F1EE428B619D970F342ABA9A65793B8B2F041AE5364350C16F735F56ECBCA87BD57B29E7";

const MULTIPLIER_DEC: &[u8] = b"1277432915985975349439481660349303019122249719989";

struct SrpGroup {
    n: BigUint,
    g: BigUint,
    k: BigUint,
}

fn group() -> &'static SrpGroup {
    static GROUP: OnceLock<SrpGroup> = OnceLock::new();
    GROUP.get_or_init(|| SrpGroup {
        n: BigUint::parse_bytes(PRIME_HEX, 16).unwrap_or_default(),
        g: BigUint::from(2u32),
        k: BigUint::parse_bytes(MULTIPLIER_DEC, 10).unwrap_or_default(),
    })
}

/// Hash used for the client proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProofHash {
    Sha1,
    Sha256,
}

fn digest<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

fn sha1(parts: &[&[u8]]) -> Vec<u8> {
    digest::<Sha1>(parts)
}

/// Big-endian magnitude without a sign byte, at most [`SRP_KEY_SIZE`] bytes
fn pad(n: &BigUint) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    if bytes.len() > SRP_KEY_SIZE {
        bytes[bytes.len() - SRP_KEY_SIZE..].to_vec()
    } else {
        bytes
    }
}

fn to_hex(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|b| format!("{:02X}", b).into_bytes())
        .collect()
}

/// Client side SRP computations
struct SrpClient {
    private_key: BigUint,
    public_key: BigUint,
}

impl SrpClient {
    fn new() -> Self {
        let mut secret = [0u8; SRP_PRIVATE_KEY_BITS / 8];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::with_private_key(BigUint::from_bytes_be(&secret))
    }

    fn with_private_key(private_key: BigUint) -> Self {
        let group = group();
        let public_key = group.g.modpow(&private_key, &group.n);
        Self {
            private_key,
            public_key,
        }
    }

    fn public_key_hex(&self) -> Vec<u8> {
        format!("{:X}", self.public_key).into_bytes()
    }

    fn session_key(&self, user: &str, password: &str, salt: &[u8], server_key: &BigUint) -> Vec<u8> {
        let group = group();
        let n = &group.n;
        let x = user_hash(user, password, salt);
        let u = BigUint::from_bytes_be(&sha1(&[&pad(&self.public_key), &pad(server_key)]));

        let kgx = (&group.k * group.g.modpow(&x, n)) % n;
        let diff = ((server_key % n) + n - kgx) % n;
        let exponent = (&self.private_key + (u * x) % n) % n;
        let secret = diff.modpow(&exponent, n);
        sha1(&[&secret.to_bytes_be()])
    }

    fn client_proof(
        &self,
        user: &str,
        salt: &[u8],
        server_key: &BigUint,
        session_key: &[u8],
        hash: ProofHash,
    ) -> Vec<u8> {
        let group = group();
        let n1 = BigUint::from_bytes_be(&sha1(&[&group.n.to_bytes_be()]));
        let n2 = BigUint::from_bytes_be(&sha1(&[&group.g.to_bytes_be()]));
        let n1 = n1.modpow(&n2, &group.n);
        let n2 = BigUint::from_bytes_be(&sha1(&[user.as_bytes()]));
        let parts: [&[u8]; 6] = [
            &n1.to_bytes_be(),
            &n2.to_bytes_be(),
            salt,
            &self.public_key.to_bytes_be(),
            &server_key.to_bytes_be(),
            session_key,
        ];
        match hash {
            ProofHash::Sha1 => digest::<Sha1>(&parts),
            ProofHash::Sha256 => digest::<Sha256>(&parts),
        }
    }
}

fn user_hash(user: &str, password: &str, salt: &[u8]) -> BigUint {
    let inner = sha1(&[user.as_bytes(), b":", password.as_bytes()]);
    BigUint::from_bytes_be(&sha1(&[salt, &inner]))
}

/// Split server data into salt and server public key
fn parse_server_data(data: &[u8]) -> Result<(Vec<u8>, BigUint)> {
    let invalid = || Error::Authentication("invalid SRP server data".into());
    let field = |at: usize| -> Result<(&[u8], usize)> {
        let len_bytes = data.get(at..at + 2).ok_or_else(invalid)?;
        let len = usize::from(u16::from_le_bytes([len_bytes[0], len_bytes[1]]));
        let value = data.get(at + 2..at + 2 + len).ok_or_else(invalid)?;
        Ok((value, at + 2 + len))
    };
    let (salt, next) = field(0)?;
    let (key_hex, _) = field(next)?;
    let server_key = BigUint::parse_bytes(key_hex, 16).ok_or_else(invalid)?;
    Ok((salt.to_vec(), server_key))
}

/// Client state of one SRP attempt
pub struct SrpPlugin {
    name: &'static str,
    hash: ProofHash,
    client: Option<SrpClient>,
    client_data: Option<Vec<u8>>,
    server_data: Option<Vec<u8>>,
    session_key: Option<Vec<u8>>,
}

impl std::fmt::Debug for SrpPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrpPlugin")
            .field("name", &self.name)
            .field("has_server_data", &self.has_server_data())
            .field("has_session_key", &self.session_key.is_some())
            .finish()
    }
}

impl SrpPlugin {
    fn new(name: &'static str, hash: ProofHash) -> Self {
        Self {
            name,
            hash,
            client: None,
            client_data: None,
            server_data: None,
            session_key: None,
        }
    }

    /// `Srp` with a SHA-1 client proof
    pub fn sha1() -> Self {
        Self::new(SRP_NAME, ProofHash::Sha1)
    }

    /// `Srp256` with a SHA-256 client proof
    pub fn sha256() -> Self {
        Self::new(SRP256_NAME, ProofHash::Sha256)
    }
}

impl AuthenticationPlugin for SrpPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn authenticate(&mut self, credentials: &AuthCredentials) -> Result<AuthStatus> {
        let (Some(user), Some(password)) = (credentials.normalized_login(), credentials.password())
        else {
            return Ok(AuthStatus::NotApplicable);
        };

        if self.client.is_none() {
            let client = SrpClient::new();
            self.client_data = Some(client.public_key_hex());
            self.client = Some(client);
            return Ok(AuthStatus::Continue);
        }
        let Some(client) = self.client.as_ref() else {
            return Ok(AuthStatus::NotApplicable);
        };

        if self.session_key.is_some() {
            return Err(Error::Authentication(format!(
                "{}: authentication step repeated after the proof was sent",
                self.name
            )));
        }
        let Some(server_data) = self.server_data.as_deref() else {
            return Ok(AuthStatus::Continue);
        };

        let (salt, server_key) = parse_server_data(server_data)?;
        let session_key = client.session_key(&user, password, &salt, &server_key);
        let proof = client.client_proof(&user, &salt, &server_key, &session_key, self.hash);
        tracing::trace!(plugin = self.name, "computed SRP client proof");
        self.client_data = Some(to_hex(&proof));
        self.session_key = Some(session_key);
        Ok(AuthStatus::Success)
    }

    fn client_data(&self) -> Option<&[u8]> {
        self.client_data.as_deref()
    }

    fn set_server_data(&mut self, data: Vec<u8>) {
        self.server_data = if data.is_empty() { None } else { Some(data) };
    }

    fn has_server_data(&self) -> bool {
        self.server_data.is_some()
    }

    fn generates_session_key(&self) -> bool {
        true
    }

    fn session_key(&self) -> Result<Vec<u8>> {
        self.session_key.clone().ok_or_else(|| {
            Error::Authentication(format!("{}: session key not yet available", self.name))
        })
    }
}

/// Provider of `Srp`
#[derive(Debug, Default, Clone, Copy)]
pub struct SrpPluginSpi;

impl AuthenticationPluginSpi for SrpPluginSpi {
    fn plugin_name(&self) -> &str {
        SRP_NAME
    }

    fn create_plugin(&self) -> Box<dyn AuthenticationPlugin> {
        Box::new(SrpPlugin::sha1())
    }
}

/// Provider of `Srp256`
#[derive(Debug, Default, Clone, Copy)]
pub struct Srp256PluginSpi;

impl AuthenticationPluginSpi for Srp256PluginSpi {
    fn plugin_name(&self) -> &str {
        SRP256_NAME
    }

    fn create_plugin(&self) -> Box<dyn AuthenticationPlugin> {
        Box::new(SrpPlugin::sha256())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Server side of the exchange for a known user
    struct TestServer {
        salt: Vec<u8>,
        verifier: BigUint,
        private_key: BigUint,
        public_key: BigUint,
    }

    impl TestServer {
        fn new(user: &str, password: &str) -> Self {
            let group = group();
            let salt = b"0123456789ABCDEF0123456789ABCDEF".to_vec();
            let verifier = group.g.modpow(&user_hash(user, password, &salt), &group.n);
            let private_key = BigUint::from(0x1234_5678_9abc_def0u64);
            let public_key =
                (&group.k * &verifier + group.g.modpow(&private_key, &group.n)) % &group.n;
            Self {
                salt,
                verifier,
                private_key,
                public_key,
            }
        }

        fn server_data(&self) -> Vec<u8> {
            let key_hex = format!("{:X}", self.public_key).into_bytes();
            let mut out = (self.salt.len() as u16).to_le_bytes().to_vec();
            out.extend_from_slice(&self.salt);
            out.extend_from_slice(&(key_hex.len() as u16).to_le_bytes());
            out.extend_from_slice(&key_hex);
            out
        }

        fn session_key(&self, client_public: &BigUint) -> Vec<u8> {
            let group = group();
            let u = BigUint::from_bytes_be(&sha1(&[&pad(client_public), &pad(&self.public_key)]));
            let base = (client_public * self.verifier.modpow(&u, &group.n)) % &group.n;
            sha1(&[&base.modpow(&self.private_key, &group.n).to_bytes_be()])
        }
    }

    fn credentials() -> AuthCredentials {
        AuthCredentials::new(Some("sysdba".into()), Some("masterkey".into()))
    }

    #[test]
    fn test_group_parameters() {
        let group = group();
        assert_eq!(group.n.bits(), 1024);
        assert_eq!(group.k.bits(), 160);
    }

    #[test]
    fn test_both_sides_derive_same_session_key() {
        let server = TestServer::new("SYSDBA", "masterkey");
        let mut plugin = SrpPlugin::sha256();

        assert_eq!(plugin.authenticate(&credentials()).unwrap(), AuthStatus::Continue);
        let client_public =
            BigUint::parse_bytes(plugin.client_data().unwrap(), 16).expect("hex public key");
        assert!(plugin.session_key().is_err());

        plugin.set_server_data(server.server_data());
        assert!(plugin.has_server_data());
        assert_eq!(plugin.authenticate(&credentials()).unwrap(), AuthStatus::Success);

        assert_eq!(plugin.session_key().unwrap(), server.session_key(&client_public));
        // SHA-256 proof as upper-case hex
        assert_eq!(plugin.client_data().unwrap().len(), 64);
    }

    #[test]
    fn test_sha1_proof_length() {
        let server = TestServer::new("SYSDBA", "masterkey");
        let mut plugin = SrpPluginSpi.create_plugin();
        plugin.authenticate(&credentials()).unwrap();
        plugin.set_server_data(server.server_data());
        plugin.authenticate(&credentials()).unwrap();
        assert_eq!(plugin.client_data().unwrap().len(), 40);
        assert_eq!(plugin.session_key().unwrap().len(), 20);
    }

    #[test]
    fn test_wrong_password_gives_different_key() {
        let server = TestServer::new("SYSDBA", "other");
        let mut plugin = SrpPlugin::sha1();
        plugin.authenticate(&credentials()).unwrap();
        let client_public = BigUint::parse_bytes(plugin.client_data().unwrap(), 16).unwrap();
        plugin.set_server_data(server.server_data());
        plugin.authenticate(&credentials()).unwrap();
        assert_ne!(plugin.session_key().unwrap(), server.session_key(&client_public));
    }

    #[test]
    fn test_repeated_step_is_error() {
        let server = TestServer::new("SYSDBA", "masterkey");
        let mut plugin = SrpPlugin::sha1();
        plugin.authenticate(&credentials()).unwrap();
        plugin.set_server_data(server.server_data());
        plugin.authenticate(&credentials()).unwrap();
        assert!(plugin.authenticate(&credentials()).is_err());
    }

    #[test]
    fn test_truncated_server_data() {
        let mut plugin = SrpPlugin::sha1();
        plugin.authenticate(&credentials()).unwrap();
        plugin.set_server_data(vec![10, 0, b'x']);
        assert!(matches!(
            plugin.authenticate(&credentials()),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn test_not_applicable_without_password() {
        let mut plugin = SrpPlugin::sha256();
        let creds = AuthCredentials::new(Some("SYSDBA".into()), None);
        assert_eq!(plugin.authenticate(&creds).unwrap(), AuthStatus::NotApplicable);
    }
}
