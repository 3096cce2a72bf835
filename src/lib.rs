//! Infrastructure for a static website: a private S3 bucket for the site
//! assets, a cloudfront distribution in front of it, a DNS validated ACM
//! certificate and a route53 alias record binding `<repo>.<zone>` to the
//! distribution.
//!
//! Everything here assembles a cloudformation template. Serving, caching,
//! certificate validation and DNS all happen in the managed services.

mod config;
pub use config::*;

mod stack;
pub use stack::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid repo name '{0}'. Must be a lowercase DNS label: letters, digits and hyphens")]
    InvalidRepoName(String),
    #[error(transparent)]
    Stack(#[from] aws_cfn_stack::Error),
    #[error(transparent)]
    Bucket(#[from] aws_s3::Error),
    #[error(transparent)]
    Distribution(#[from] aws_cloudfront_distribution::Error),
    #[error(transparent)]
    Certificate(#[from] aws_acm_cert::Error),
    #[error(transparent)]
    Dns(#[from] aws_route53::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
