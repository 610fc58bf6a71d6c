//! AWS-backed stores: SSM Parameter Store, Secrets Manager and STS.
//!
//! The SDK is async; every call is driven to completion on a private
//! current-thread runtime so callers stay synchronous.

use super::{ParameterStore, SecretStore};
use crate::core::error::{Error, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::ParameterType;
use tokio::runtime::Runtime;
use tracing::debug;

pub struct AwsStores {
    runtime: Runtime,
    ssm: aws_sdk_ssm::Client,
    secrets: aws_sdk_secretsmanager::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsStores {
    /// Load credentials from the default provider chain.
    /// `region` overrides the chain's region when given.
    pub fn connect(region: Option<&str>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::io("tokio runtime", e))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = runtime.block_on(loader.load());

        Ok(Self {
            ssm: aws_sdk_ssm::Client::new(&sdk_config),
            secrets: aws_sdk_secretsmanager::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
            runtime,
        })
    }

    /// Account id of the current credentials.
    pub fn caller_account(&self) -> Result<String> {
        let output = self
            .runtime
            .block_on(self.sts.get_caller_identity().send())
            .map_err(|e| Error::CallerIdentity(DisplayErrorContext(&e).to_string()))?;
        account_from(output.account())
    }
}

/// The account id of a GetCallerIdentity response. A response without one
/// is an error, never a placeholder.
fn account_from(account: Option<&str>) -> Result<String> {
    account
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::CallerIdentity("response carried no account id".to_string()))
}

impl ParameterStore for AwsStores {
    fn get_parameter(&self, path: &str) -> Result<Option<String>> {
        debug!(path, "ssm get-parameter");
        let result = self
            .runtime
            .block_on(self.ssm.get_parameter().name(path).send());
        match result {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|p| p.value())
                .map(str::to_string)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_parameter_not_found()) =>
            {
                Ok(None)
            }
            Err(err) => Err(Error::ParameterStore {
                path: path.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            }),
        }
    }

    fn put_parameter(&self, path: &str, value: &str, description: &str) -> Result<()> {
        debug!(path, "ssm put-parameter");
        self.runtime
            .block_on(
                self.ssm
                    .put_parameter()
                    .name(path)
                    .value(value)
                    .description(description)
                    .r#type(ParameterType::String)
                    .overwrite(true)
                    .send(),
            )
            .map_err(|e| Error::ParameterStore {
                path: path.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

impl SecretStore for AwsStores {
    /// Put a new version of the secret, creating it on first use.
    fn put_secret(&self, id: &str, value: &str) -> Result<()> {
        debug!(id, "secretsmanager put-secret-value");
        let result = self.runtime.block_on(
            self.secrets
                .put_secret_value()
                .secret_id(id)
                .secret_string(value)
                .send(),
        );
        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                debug!(id, "secretsmanager create-secret");
                self.runtime
                    .block_on(
                        self.secrets
                            .create_secret()
                            .name(id)
                            .secret_string(value)
                            .send(),
                    )
                    .map_err(|e| Error::SecretStore {
                        id: id.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    })?;
                Ok(())
            }
            Err(err) => Err(Error::SecretStore {
                id: id.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_from_response() {
        assert_eq!(account_from(Some("999")).unwrap(), "999");
    }

    #[test]
    fn test_missing_account_is_an_error() {
        for account in [None, Some("")] {
            let err = account_from(account).unwrap_err();
            assert!(matches!(err, Error::CallerIdentity(_)));
            assert!(err.to_string().contains("no account id"));
        }
    }
}
