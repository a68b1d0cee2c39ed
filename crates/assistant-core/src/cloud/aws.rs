//! AWS CLI tool definition

use super::command::{CommandLineTool, CommandSpec};

/// Provider tag for Amazon Web Services
pub const AWS_PROVIDER: &str = "aws";

/// The `aws_cli` tool: runs `aws <command>`
pub fn aws_cli_tool() -> CommandLineTool {
    CommandLineTool::new(
        CommandSpec::new(
            "aws_cli",
            "Execute AWS CLI commands to interact with AWS services",
            AWS_PROVIDER,
            "aws",
        )
        .with_capabilities(&["storage", "compute", "network", "identity", "database"])
        .with_keywords(&["aws", "s3", "ec2", "lambda", "iam", "rds", "dynamodb"]),
    )
}
