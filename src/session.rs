use crate::{consts::DEFAULT_PROFILE, types::SessionIdentity};

/// Supplies the credential/region identity a newly created function is
/// stamped with.
pub trait SessionProvider: Send + Sync {
    fn active_session(&self) -> SessionIdentity;
}

/// A session fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticSessionProvider {
    identity: SessionIdentity,
}

impl StaticSessionProvider {
    pub fn new(identity: SessionIdentity) -> Self {
        Self { identity }
    }

    /// Identity of a loaded AWS configuration, named after the profile it was
    /// loaded from.
    pub fn from_sdk_config(config: &aws_config::SdkConfig, profile: Option<&str>) -> Self {
        let region = config
            .region()
            .map(|region| region.as_ref().to_string())
            .unwrap_or_default();
        let credential_id = format!("profile:{}", profile.unwrap_or(DEFAULT_PROFILE));

        Self::new(SessionIdentity::new(credential_id, region))
    }
}

impl SessionProvider for StaticSessionProvider {
    fn active_session(&self) -> SessionIdentity {
        self.identity.clone()
    }
}
