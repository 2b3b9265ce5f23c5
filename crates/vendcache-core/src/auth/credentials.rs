use anyhow::{Context, Result};
use keyring::Entry;
use rand::{distributions::Alphanumeric, Rng};

const SERVICE_NAME: &str = "vendcache";

/// Keychain account holding the storage-seal passphrase.
const SEAL_ACCOUNT: &str = "storage-seal";

/// Length of the generated seal passphrase.
const SEAL_PASSPHRASE_LEN: usize = 32;

pub struct CredentialStore;

impl CredentialStore {
    /// Store a login password in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for an email from the OS keychain
    pub fn get_password(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete stored credentials for an email
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    /// Check if credentials exist for an email
    pub fn has_credentials(email: &str) -> bool {
        if let Ok(entry) = Entry::new(SERVICE_NAME, email) {
            entry.get_password().is_ok()
        } else {
            false
        }
    }

    /// Fetch the storage-seal passphrase, generating and storing one on
    /// first use. The passphrase never leaves the keychain otherwise.
    pub fn seal_passphrase() -> Result<String> {
        let entry =
            Entry::new(SERVICE_NAME, SEAL_ACCOUNT).context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(passphrase) => Ok(passphrase),
            Err(keyring::Error::NoEntry) => {
                let passphrase: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(SEAL_PASSPHRASE_LEN)
                    .map(char::from)
                    .collect();
                entry
                    .set_password(&passphrase)
                    .context("Failed to store seal passphrase in keychain")?;
                Ok(passphrase)
            }
            Err(e) => Err(e).context("Failed to read seal passphrase from keychain"),
        }
    }
}
