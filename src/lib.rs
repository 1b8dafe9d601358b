//! Packaging, upload and deployment of AWS Lambda functions.
//!
//! [`creator::LambdaCreator`] chains a [`packager::Packager`], a
//! [`uploader::CodeUploader`] and a [`lifecycle::FunctionLifecycleManager`]
//! into the create and update flows. Remote services are reached through the
//! [`object_store::ObjectStore`] and [`lambda_client::FunctionService`]
//! traits; [`memory`] has in-process implementations of both.

pub mod cli;
pub mod consts;
pub mod creator;
pub mod errors;
pub mod function_config;
pub mod lambda_client;
pub mod lifecycle;
pub mod main_actions;
pub mod memory;
pub mod object_store;
pub mod packager;
pub mod request;
pub mod session;
pub mod types;
pub mod uploader;
pub mod utils;
