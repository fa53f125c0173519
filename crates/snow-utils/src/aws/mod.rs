//! AWS clients used by the external volume tool

pub mod account;
pub mod cloud;
pub mod context;
pub mod error;
pub mod iam;
pub mod s3;

pub use account::{AccountId, get_current_account_id};
pub use cloud::{AwsCloud, CloudApi};
pub use context::AwsContext;
pub use error::{AwsError, classify_aws_error};
pub use iam::IamClient;
pub use s3::S3Client;
