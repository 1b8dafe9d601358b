use crate::{
    cli::{DetailsArgs, SourceArgs},
    consts::{DEFAULT_MEMORY_SIZE_MB, DEFAULT_TIMEOUT_SECS, PKG_NAME},
    creator::LambdaCreator,
    function_config::FunctionConfigBuilder,
    lambda_client::AwsLambdaClient,
    lifecycle::FunctionLifecycleManager,
    object_store::S3ObjectStore,
    packager::ZipPackager,
    session::StaticSessionProvider,
    types::{FunctionUploadDetails, ModuleSource},
    uploader::CodeUploader,
};
use anyhow::{anyhow, Context, Ok, Result as AnyResult};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{trace_span, Instrument};

/// Connection settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    pub profile: Option<String>,
    pub region: Option<String>,
}

pub async fn load_aws_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    loader.load().await
}

pub fn default_package_dir() -> PathBuf {
    std::env::temp_dir().join(PKG_NAME)
}

pub fn build_creator(
    config: &SdkConfig,
    settings: &AwsSettings,
    package_dir: PathBuf,
) -> LambdaCreator {
    let session = StaticSessionProvider::from_sdk_config(config, settings.profile.as_deref());

    LambdaCreator::new(
        Arc::new(ZipPackager::new(package_dir)),
        CodeUploader::new(Arc::new(S3ObjectStore::new(config))),
        FunctionLifecycleManager::new(Arc::new(AwsLambdaClient::new(config)), Arc::new(session)),
    )
}

pub async fn read_details_from_file(path: &Path) -> AnyResult<FunctionUploadDetails> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read details file")?;

    let details = match path.extension().and_then(|extension| extension.to_str()) {
        Some("json") => serde_json::from_str(&contents).context("Failed to parse details")?,
        _ => serde_yaml::from_str(&contents).context("Failed to parse details")?,
    };

    Ok(details)
}

fn required(flag: Option<String>, file: Option<&String>, name: &str) -> AnyResult<String> {
    flag.or_else(|| file.cloned())
        .ok_or_else(|| anyhow!("Missing function {name}. Pass --{name} or a details file"))
}

/// Merges the details file, if any, with the flags. Flags win.
pub async fn resolve_details(args: DetailsArgs) -> AnyResult<FunctionUploadDetails> {
    let file = match &args.details_file {
        Some(path) => Some(read_details_from_file(path).await?),
        None => None,
    };
    let file = file.as_ref();

    let mut env_vars = file.map(|file| file.env_vars.clone()).unwrap_or_default();
    env_vars.extend(args.env_vars);

    let details = FunctionUploadDetails {
        name: required(args.name, file.map(|file| &file.name), "name")?,
        description: args
            .description
            .or_else(|| file.map(|file| file.description.clone()))
            .unwrap_or_default(),
        handler: required(args.handler, file.map(|file| &file.handler), "handler")?,
        runtime: required(args.runtime, file.map(|file| &file.runtime), "runtime")?,
        role_arn: required(args.role, file.map(|file| &file.role_arn), "role")?,
        timeout: args
            .timeout
            .or_else(|| file.map(|file| file.timeout))
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        memory_size: args
            .memory_size
            .or_else(|| file.map(|file| file.memory_size))
            .unwrap_or(DEFAULT_MEMORY_SIZE_MB),
        env_vars,
        tracing_mode: args
            .tracing_mode
            .or_else(|| file.map(|file| file.tracing_mode))
            .unwrap_or_default(),
    };

    details.validate().context("Invalid function details")?;

    Ok(details)
}

fn module_source(source: &SourceArgs, details: &FunctionUploadDetails) -> ModuleSource {
    let name = source
        .module_name
        .clone()
        .unwrap_or_else(|| details.name.clone());
    ModuleSource::new(name, source.module_root.clone())
}

pub async fn create_lambda(
    settings: AwsSettings,
    source: SourceArgs,
    details: DetailsArgs,
) -> AnyResult<()> {
    let details = resolve_details(details).await?;
    let config = load_aws_config(&settings).await;
    let package_dir = source.package_dir.clone().unwrap_or_else(default_package_dir);
    let creator = build_creator(&config, &settings, package_dir);
    let module = module_source(&source, &details);

    let span = trace_span!("Create", function = %details.name, bucket = %source.bucket);

    let function = creator
        .create_lambda(&module, &source.source_file, &details, &source.bucket)
        .instrument(span)
        .await
        .context("Failed to create function")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&function).context("Failed to serialize function")?
    );

    Ok(())
}

pub async fn update_lambda(
    settings: AwsSettings,
    source: SourceArgs,
    details: DetailsArgs,
    code_only: bool,
) -> AnyResult<()> {
    let details = resolve_details(details).await?;
    let config = load_aws_config(&settings).await;
    let package_dir = source.package_dir.clone().unwrap_or_else(default_package_dir);
    let creator = build_creator(&config, &settings, package_dir);
    let module = module_source(&source, &details);

    let span = trace_span!("Update", function = %details.name, bucket = %source.bucket);

    creator
        .update_lambda(
            &module,
            &source.source_file,
            &details,
            &source.bucket,
            !code_only,
        )
        .instrument(span)
        .await
        .context("Failed to update function")?;

    Ok(())
}

pub async fn update_configuration(settings: AwsSettings, details: DetailsArgs) -> AnyResult<()> {
    let details = resolve_details(details).await?;
    let config = load_aws_config(&settings).await;
    let session = StaticSessionProvider::from_sdk_config(&config, settings.profile.as_deref());
    let lifecycle =
        FunctionLifecycleManager::new(Arc::new(AwsLambdaClient::new(&config)), Arc::new(session));

    let span = trace_span!("UpdateConfiguration", function = %details.name);

    lifecycle
        .update_configuration(&details)
        .instrument(span)
        .await
        .context("Failed to update function configuration")?;

    Ok(())
}

pub async fn generate_configuration_yaml(details: DetailsArgs) -> AnyResult<String> {
    let details = resolve_details(details).await?;
    FunctionConfigBuilder::new(&details)
        .to_yaml_string()
        .context("Failed to generate configuration")
}

pub async fn print_configuration(details: DetailsArgs) -> AnyResult<()> {
    println!("{}", generate_configuration_yaml(details).await?);
    Ok(())
}

pub async fn write_configuration_to_file(file: PathBuf, details: DetailsArgs) -> AnyResult<()> {
    let configuration = generate_configuration_yaml(details).await?;
    tokio::fs::write(file, configuration)
        .await
        .context("Failed to write configuration to file")?;
    Ok(())
}
