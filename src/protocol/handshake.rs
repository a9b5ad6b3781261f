//! Realm authentication handshake.
//!
//! The exchange runs over four server messages:
//!
//! 1. `SID_AUTH_INFO` carries the server token and version formula. We answer with
//!    `SID_AUTH_CHECK`: executable version proof plus one CD-key proof per product.
//! 2. `SID_AUTH_CHECK` reports the key state. On success we start the password
//!    exchange and send our public value in `SID_AUTH_ACCOUNTLOGON`.
//! 3. `SID_AUTH_ACCOUNTLOGON` supplies salt and server public value. We answer with
//!    the password proof.
//! 4. `SID_AUTH_ACCOUNTLOGONPROOF` accepts or rejects the proof.
//!
//! Hashing, revision checks, CD-key decoding and the SRP math live behind
//! [`AuthPrimitives`]; this module only sequences them and builds packets.
//!
//! **Per-Session State**
//! Each realm session owns one [`AuthHandshake`]. Nothing is shared between
//! sessions, so concurrent logins to different realms never interfere.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::config::{PasswordHashType, RealmConfig};
use crate::core::packet::Packet;
use crate::error::{constants, HandshakeError, HandshakeRejection, Result};
use crate::protocol::realm::encode;
use crate::protocol::realm::message::{
    AccountLogonChallenge, AccountLogonProof, AuthCheckRequest, AuthCheckResult, AuthInfo, KeyInfo,
};
use crate::protocol::realm::opcode::{key_state, logon_status};

/// Result type of the [`AuthPrimitives`] operations.
pub type PrimitiveResult<T> = std::result::Result<T, HandshakeError>;

/// Version information read from the game executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExeInfo {
    /// `war3.exe <date> <size>` style descriptor.
    pub description: String,
    pub version: u32,
}

/// Game files hashed by the revision check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFiles {
    pub war3_exe: PathBuf,
    pub storm_dll: PathBuf,
    pub game_dll: PathBuf,
}

/// Cryptographic and file-hashing operations the handshake depends on.
///
/// Implementations typically wrap a native helper library. The password
/// exchange is stateful: [`srp_start`](Self::srp_start) begins a new exchange
/// and [`srp_proof`](Self::srp_proof) completes the most recent one.
pub trait AuthPrimitives: Send {
    fn exe_info(&self, war3_exe: &Path) -> PrimitiveResult<ExeInfo>;

    fn check_revision(
        &self,
        formula: &str,
        files: &VersionFiles,
        mpq_number: u32,
    ) -> PrimitiveResult<u32>;

    fn cd_key_info(
        &self,
        key: &str,
        client_token: u32,
        server_token: u32,
    ) -> PrimitiveResult<KeyInfo>;

    /// Starts a password exchange and returns the client public value.
    fn srp_start(
        &mut self,
        username: &str,
        password: &str,
    ) -> PrimitiveResult<Vec<u8>>;

    fn srp_proof(
        &mut self,
        salt: &[u8; 32],
        server_public_key: &[u8; 32],
    ) -> PrimitiveResult<[u8; 20]>;

    /// Broken-SHA1 password hash accepted by PvPGN servers in place of an SRP proof.
    fn hash_password(&self, password: &str) -> PrimitiveResult<[u8; 20]>;
}

/// Everything the handshake needs from the realm configuration.
#[derive(Debug, Clone)]
pub struct HandshakeSettings {
    pub username: String,
    pub password: String,
    pub key_roc: String,
    pub key_tft: String,
    pub tft: bool,
    pub client_token: u32,
    pub exe_version: Option<u32>,
    pub exe_version_hash: Option<u32>,
    pub password_hash_type: PasswordHashType,
    pub key_owner: String,
    pub files: VersionFiles,
}

impl HandshakeSettings {
    pub fn from_config(realm: &RealmConfig, tft: bool) -> Self {
        Self {
            username: realm.username.clone(),
            password: realm.password.clone(),
            key_roc: realm.key_roc.clone(),
            key_tft: realm.key_tft.clone(),
            tft,
            client_token: realm.client_token,
            exe_version: realm.exe_version,
            exe_version_hash: realm.exe_version_hash,
            password_hash_type: realm.password_hash_type,
            key_owner: realm.key_owner.clone(),
            files: VersionFiles {
                war3_exe: realm.war3_exe.clone(),
                storm_dll: realm.storm_dll.clone(),
                game_dll: realm.game_dll.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Start,
    InfoReceived,
    KeyChallengeReceived,
    LogonChallengeReceived,
    ProofReceived,
    Authenticated,
    Rejected,
}

impl HandshakeStage {
    pub fn name(self) -> &'static str {
        match self {
            HandshakeStage::Start => "start",
            HandshakeStage::InfoReceived => "info-received",
            HandshakeStage::KeyChallengeReceived => "key-challenge-received",
            HandshakeStage::LogonChallengeReceived => "logon-challenge-received",
            HandshakeStage::ProofReceived => "proof-received",
            HandshakeStage::Authenticated => "authenticated",
            HandshakeStage::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeStage::Authenticated | HandshakeStage::Rejected)
    }
}

/// One login attempt against one realm.
pub struct AuthHandshake<P: AuthPrimitives> {
    settings: HandshakeSettings,
    primitives: P,
    stage: HandshakeStage,
    server_token: Option<u32>,
}

impl<P: AuthPrimitives> AuthHandshake<P> {
    pub fn new(settings: HandshakeSettings, primitives: P) -> Self {
        Self {
            settings,
            primitives,
            stage: HandshakeStage::Start,
            server_token: None,
        }
    }

    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    pub fn server_token(&self) -> Option<u32> {
        self.server_token
    }

    pub fn settings(&self) -> &HandshakeSettings {
        &self.settings
    }

    /// Back to [`HandshakeStage::Start`] for a fresh connection.
    pub fn reset(&mut self) {
        self.stage = HandshakeStage::Start;
        self.server_token = None;
    }

    fn expect_stage(&self, expected: HandshakeStage, got: &'static str) -> Result<()> {
        if self.stage != expected {
            return Err(HandshakeError::OutOfOrder {
                stage: self.stage.name(),
                got,
            }
            .into());
        }
        Ok(())
    }

    fn reject(&mut self, rejection: HandshakeRejection) -> HandshakeError {
        self.stage = HandshakeStage::Rejected;
        HandshakeError::Rejected(rejection)
    }

    /// Builds `SID_AUTH_CHECK` from the server challenge.
    ///
    /// # Errors
    /// Any failing primitive is fatal. Key derivation is never retried.
    #[instrument(skip_all, fields(logon_type = info.logon_type))]
    pub fn on_auth_info(&mut self, info: &AuthInfo) -> Result<Packet> {
        self.expect_stage(HandshakeStage::Start, "auth info")?;
        self.server_token = Some(info.server_token);

        let exe = self
            .primitives
            .exe_info(&self.settings.files.war3_exe)
            .map_err(|e| self.fail(e))?;
        let exe_version = self.settings.exe_version.unwrap_or(exe.version);

        let exe_version_hash = match self.settings.exe_version_hash {
            Some(hash) => hash,
            None => {
                let revision = match info.mpq_number() {
                    Some(mpq_number) => self.primitives.check_revision(
                        &info.version_formula,
                        &self.settings.files,
                        mpq_number,
                    ),
                    None => Err(HandshakeError::Primitive(format!(
                        "no archive number in version file name {:?}",
                        info.exe_file_name
                    ))),
                };
                revision.map_err(|e| self.fail(e))?
            }
        };

        let key_roc = self
            .key_info(&self.settings.key_roc, info.server_token)
            .map_err(|e| self.fail(e))?;
        let key_tft = if self.settings.tft {
            info!("attempting to auth as Warcraft III: The Frozen Throne");
            Some(
                self.key_info(&self.settings.key_tft, info.server_token)
                    .map_err(|e| self.fail(e))?,
            )
        } else {
            info!("attempting to auth as Warcraft III: Reign of Chaos");
            None
        };

        self.stage = HandshakeStage::InfoReceived;
        encode::auth_check(&AuthCheckRequest {
            client_token: self.settings.client_token,
            exe_version,
            exe_version_hash,
            key_roc,
            key_tft,
            exe_info: exe.description,
            key_owner: self.settings.key_owner.clone(),
        })
    }

    fn key_info(&self, key: &str, server_token: u32) -> PrimitiveResult<KeyInfo> {
        self.primitives
            .cd_key_info(key, self.settings.client_token, server_token)
            .map_err(|e| match e {
                HandshakeError::KeyDerivation(_) => e,
                other => HandshakeError::KeyDerivation(other.to_string()),
            })
    }

    fn fail(&mut self, err: HandshakeError) -> HandshakeError {
        self.stage = HandshakeStage::Rejected;
        err
    }

    /// Checks the key state and, on success, starts the password exchange.
    ///
    /// A public value of the wrong length is retried once with a fresh exchange;
    /// a second bad value is fatal.
    #[instrument(skip_all, fields(key_state = result.key_state))]
    pub fn on_auth_check(&mut self, result: &AuthCheckResult) -> Result<Packet> {
        self.expect_stage(HandshakeStage::InfoReceived, "auth check result")?;

        if result.key_state != key_state::GOOD {
            let description = if result.description.is_empty() {
                key_state::describe(result.key_state).to_string()
            } else {
                format!(
                    "{} ({})",
                    key_state::describe(result.key_state),
                    result.description
                )
            };
            return Err(self
                .reject(HandshakeRejection::KeyState {
                    code: result.key_state,
                    description,
                })
                .into());
        }

        let mut public = self.start_password_exchange()?;
        if public.len() != 32 {
            warn!(len = public.len(), "client public value has wrong length, retrying");
            public = self.start_password_exchange()?;
            if public.len() != 32 {
                return Err(self.fail(HandshakeError::PublicKeyLength(public.len())).into());
            }
        }

        self.stage = HandshakeStage::KeyChallengeReceived;
        encode::account_logon(&public, &self.settings.username)
    }

    fn start_password_exchange(&mut self) -> PrimitiveResult<Vec<u8>> {
        let (username, password) = (&self.settings.username, &self.settings.password);
        match self.primitives.srp_start(username, password) {
            Ok(public) => Ok(public),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Answers the salt/public-value challenge with our password proof.
    #[instrument(skip_all, fields(status = challenge.status))]
    pub fn on_logon_challenge(&mut self, challenge: &AccountLogonChallenge) -> Result<Packet> {
        self.expect_stage(HandshakeStage::KeyChallengeReceived, "logon challenge")?;

        if challenge.status != logon_status::ACCEPTED {
            return Err(self
                .reject(HandshakeRejection::AccountLogon {
                    status: challenge.status,
                })
                .into());
        }
        info!(username = %self.settings.username, "username accepted");

        let proof = match self.settings.password_hash_type {
            PasswordHashType::Pvpgn => {
                info!("using pvpgn logon type");
                self.primitives.hash_password(&self.settings.password)
            }
            PasswordHashType::Battlenet => {
                debug!("using battle.net logon type");
                self.primitives
                    .srp_proof(&challenge.salt, &challenge.server_public_key)
            }
        }
        .map_err(|e| self.fail(e))?;

        self.stage = HandshakeStage::LogonChallengeReceived;
        encode::account_logon_proof(&proof)
    }

    /// Final verdict. Statuses 0x00 and 0x0E are accepted.
    #[instrument(skip_all, fields(status = proof.status))]
    pub fn on_logon_proof(&mut self, proof: &AccountLogonProof) -> Result<()> {
        self.expect_stage(HandshakeStage::LogonChallengeReceived, "logon proof")?;
        self.stage = HandshakeStage::ProofReceived;

        if !proof.is_success() {
            return Err(self
                .reject(HandshakeRejection::LogonProof {
                    status: proof.status,
                    message: proof.message.clone(),
                })
                .into());
        }

        if proof.status == logon_status::PROOF_EMAIL_REQUESTED {
            info!("server asks for an email address to be registered");
        }
        self.stage = HandshakeStage::Authenticated;
        Ok(())
    }

    /// The proof reply arrived but could not be decoded. Treated as a rejection.
    pub fn on_missing_proof(&mut self) -> HandshakeError {
        self.reject(HandshakeRejection::LogonProof {
            status: u32::MAX,
            message: constants::ERR_PROOF_MISSING.to_string(),
        })
    }
}
