use anyhow::{Context, Result};
use ssh_key::rand_core::OsRng;
use ssh_key::{Algorithm, LineEnding, PrivateKey};

/// SSH credential generated for a single session.
#[derive(Clone)]
pub struct KeyPair {
    /// `authorized_keys` line, newline terminated.
    pub public_key: Vec<u8>,
    /// OpenSSH private key, encrypted when a passphrase was given.
    pub private_key: Vec<u8>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &String::from_utf8_lossy(&self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

pub trait CredentialProvisioner: Send + Sync {
    fn generate(&self, passphrase: Option<&str>) -> Result<KeyPair>;
}

#[derive(Debug, Default)]
pub struct SshKeyProvisioner;

impl CredentialProvisioner for SshKeyProvisioner {
    fn generate(&self, passphrase: Option<&str>) -> Result<KeyPair> {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .context("generating ssh key pair")?;

        let mut public_key = key
            .public_key()
            .to_openssh()
            .context("encoding ssh public key")?;
        public_key.push('\n');

        // An empty passphrase leaves the key unencrypted.
        let key = match passphrase.filter(|p| !p.is_empty()) {
            Some(passphrase) => key
                .encrypt(&mut OsRng, passphrase)
                .context("encrypting ssh private key")?,
            None => key,
        };
        let private_key = key
            .to_openssh(LineEnding::LF)
            .context("encoding ssh private key")?;

        Ok(KeyPair {
            public_key: public_key.into_bytes(),
            private_key: private_key.as_bytes().to_vec(),
        })
    }
}
