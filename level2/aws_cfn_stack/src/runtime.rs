use std::collections::BTreeMap;
use std::io::Write;

use aws_sdk_cloudformation::types::{Capability, OnFailure, Stack, StackStatus};
pub use aws_sdk_cloudformation::Client;
use aws_types::region::Region;
use tracing::info;

use super::{Error, Result, SynthesizedStack};

pub type StackOutputs = BTreeMap<String, String>;

const POLL_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_millis(700);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackChange {
    Created,
    Updated,
    Unchanged,
}

/// where a stack is after one describe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Done,
    InProgress,
    Failed,
}

/// classifies the status of a stack being created or updated.
/// an UPDATE_ROLLBACK_COMPLETE stack is usable, but the update we asked for failed.
pub fn classify(status: &StackStatus) -> StackState {
    match status {
        StackStatus::CreateComplete |
        StackStatus::UpdateComplete |
        StackStatus::ImportComplete => StackState::Done,

        StackStatus::CreateInProgress |
        StackStatus::DeleteInProgress |
        StackStatus::ImportInProgress |
        StackStatus::ImportRollbackInProgress |
        StackStatus::ReviewInProgress |
        StackStatus::RollbackInProgress |
        StackStatus::UpdateCompleteCleanupInProgress |
        StackStatus::UpdateInProgress |
        StackStatus::UpdateRollbackCompleteCleanupInProgress |
        StackStatus::UpdateRollbackInProgress => StackState::InProgress,

        _ => StackState::Failed,
    }
}

/// classifies the status of a stack being deleted.
pub fn classify_deletion(status: &StackStatus) -> StackState {
    match status {
        StackStatus::DeleteComplete => StackState::Done,
        StackStatus::DeleteFailed => StackState::Failed,
        _ => StackState::InProgress,
    }
}

fn is_missing_stack_error(message: &str) -> bool {
    message.contains("does not exist")
}

fn deploy_err<S: Into<String>>(stack: &str, reason: S) -> Error {
    Error::Deploy { stack: stack.to_string(), reason: reason.into() }
}

/// loads aws credentials from the environment. if no region is given,
/// the default provider chain picks one.
pub async fn make_client(region: Option<&str>) -> Client {
    let mut loader = aws_config::from_env();
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    let shared_config = loader.load().await;
    Client::new(&shared_config)
}

/// creates or updates the stack and blocks until it settles,
/// returning the stack outputs.
pub async fn deploy(client: &Client, stack: &SynthesizedStack) -> Result<StackOutputs> {
    let name = &stack.stack_name;
    info!(stack = %name, "about to deploy stack");
    let template_body = stack.to_json_pretty()?;
    let change = create_or_update_stack(client, name, &template_body).await?;
    if change == StackChange::Unchanged {
        println!("No changes to {name}");
        return stack_outputs(client, name).await;
    }
    let outputs = wait_for_output(client, name).await?;
    info!(stack = %name, ?change, "stack deployed");
    Ok(outputs)
}

/// one DescribeStacks call. A stack cloudformation does not know about is `None`.
async fn find_stack(client: &Client, name: &str) -> Result<Option<Stack>> {
    match client.describe_stacks().stack_name(name).send().await {
        Ok(d) => Ok(d.stacks().and_then(|stacks| stacks.first()).cloned()),
        Err(e) => {
            let e_str = format!("{:#?}", e);
            if is_missing_stack_error(&e_str) {
                return Ok(None);
            }
            Err(deploy_err(name, e_str))
        }
    }
}

pub async fn does_stack_exist(client: &Client, name: &str) -> Result<bool> {
    Ok(find_stack(client, name).await?.is_some())
}

async fn get_stack(client: &Client, name: &str) -> Result<Stack> {
    find_stack(client, name).await?
        .ok_or_else(|| deploy_err(name, format!("Stack {name} does not exist")))
}

/// returns Some(stack) once the stack reached a successful terminal state,
/// None while it is still in progress, and an error for failed states.
pub async fn describe_stack(client: &Client, name: &str) -> Result<Option<Stack>> {
    let stack = get_stack(client, name).await?;
    let status = match stack.stack_status() {
        Some(status) => status,
        None => return Err(deploy_err(name, format!("Stack {name} has no status"))),
    };
    match classify(status) {
        StackState::Done => Ok(Some(stack)),
        StackState::InProgress => Ok(None),
        StackState::Failed => {
            let reason = stack.stack_status_reason()
                .unwrap_or("Failed to get stack failure reason");
            Err(deploy_err(name, format!("{}: {reason}", status.as_str())))
        }
    }
}

fn collect_outputs(stack: &Stack) -> StackOutputs {
    let mut out = StackOutputs::new();
    for output in stack.outputs().unwrap_or_default() {
        if let (Some(key), Some(val)) = (output.output_key(), output.output_value()) {
            out.insert(key.to_string(), val.to_string());
        }
    }
    out
}

/// outputs of an already deployed stack, regardless of its current status.
pub async fn stack_outputs(client: &Client, name: &str) -> Result<StackOutputs> {
    let stack = get_stack(client, name).await?;
    Ok(collect_outputs(&stack))
}

pub async fn wait_for_output(client: &Client, name: &str) -> Result<StackOutputs> {
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        match describe_stack(client, name).await? {
            Some(stack) => {
                println!();
                return Ok(collect_outputs(&stack));
            }
            None => {
                // still waiting
                print!(".");
                let _ = std::io::stdout().flush();
            }
        }
    }
}

pub async fn create_or_update_stack(client: &Client, name: &str, body: &str) -> Result<StackChange> {
    let exists = does_stack_exist(client, name).await?;
    if exists {
        print!("Updating {name} ...");
        let _ = std::io::stdout().flush();
        let res = client
            .update_stack()
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await;
        if let Err(e) = res {
            let e_str = format!("{:#?}", e);
            if e_str.contains("No updates are to be performed") {
                println!();
                return Ok(StackChange::Unchanged);
            }
            return Err(deploy_err(name, e_str));
        }
        Ok(StackChange::Updated)
    } else {
        print!("Creating {name} ...");
        let _ = std::io::stdout().flush();
        client
            .create_stack()
            .on_failure(OnFailure::Delete)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await
            .map_err(|e| deploy_err(name, format!("{:#?}", e)))?;
        Ok(StackChange::Created)
    }
}

/// deletes the stack and waits until cloudformation no longer reports it.
/// deleting a stack that does not exist is not an error.
pub async fn delete_stack(client: &Client, name: &str) -> Result<()> {
    if !does_stack_exist(client, name).await? {
        info!(stack = %name, "stack does not exist, nothing to delete");
        return Ok(());
    }
    print!("Deleting {name} ...");
    let _ = std::io::stdout().flush();
    client.delete_stack().stack_name(name).send().await
        .map_err(|e| deploy_err(name, format!("{:#?}", e)))?;
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        // a stack that vanished between polls is deleted
        let stack = match find_stack(client, name).await? {
            Some(stack) => stack,
            None => break,
        };
        match stack.stack_status().map(classify_deletion) {
            Some(StackState::Done) => break,
            Some(StackState::Failed) => {
                let reason = stack.stack_status_reason().unwrap_or("Failed to get stack failure reason");
                return Err(deploy_err(name, reason));
            }
            _ => {
                print!(".");
                let _ = std::io::stdout().flush();
            }
        }
    }
    println!();
    info!(stack = %name, "stack deleted");
    Ok(())
}
