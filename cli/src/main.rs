//! Co-host CLI client - manage listing co-hosts from the terminal

mod client;
mod messages;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::client::CohostClient;
use crate::messages::{CreateInvitationRequest, Delegation, DelegationChange, Invitation};

#[derive(Parser)]
#[command(name = "cohost")]
#[command(about = "CLI client for the co-host delegation service")]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "COHOST_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// User id to act as
    #[arg(short, long, env = "COHOST_ACTOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the actor as owner of a listing
    Register {
        /// Listing ID
        #[arg(short, long)]
        listing: String,
    },

    /// Invite a co-host to a listing
    Invite {
        /// Listing ID
        #[arg(short, long)]
        listing: String,

        /// Invitee email address
        #[arg(short, long)]
        email: String,

        /// co_host, manager or assistant
        #[arg(short, long, default_value = "co_host")]
        role: String,

        /// Capabilities to grant (repeat or comma separate)
        #[arg(short, long, value_delimiter = ',', required = true)]
        permissions: Vec<String>,

        /// Display title for the co-host
        #[arg(short, long)]
        title: Option<String>,

        /// Personal message included in the email
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List invitations for a listing
    Invitations {
        /// Listing ID
        #[arg(short, long)]
        listing: String,

        /// Only show invitations with this status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Cancel a pending invitation
    Cancel { invitation: Uuid },

    /// Send a pending invitation again
    Resend { invitation: Uuid },

    /// Show what an invitation offers
    Preview { token: String },

    /// Accept an invitation
    Accept { token: String },

    /// Decline an invitation
    Decline {
        token: String,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// List co-hosts of a listing
    Cohosts {
        /// Listing ID
        #[arg(short, long)]
        listing: String,
    },

    /// Temporarily revoke a co-host's access
    Suspend { delegation: Uuid },

    /// Restore a suspended co-host
    Reinstate { delegation: Uuid },

    /// Permanently remove a co-host
    Remove { delegation: Uuid },

    /// Replace a co-host's capabilities
    SetPermissions {
        delegation: Uuid,

        #[arg(value_delimiter = ',', required = true)]
        permissions: Vec<String>,
    },

    /// Check whether the actor holds a capability on a listing
    Authorize {
        /// Listing ID
        #[arg(short, long)]
        listing: String,

        capability: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cohost_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let client = CohostClient::new(&cli.server, cli.actor)?;

    match cli.command {
        Commands::Register { listing } => {
            let ownership = client.register_listing(&listing).await?;
            if ownership.created {
                println!("Registered {} (owner {})", ownership.listing_id, ownership.owner_id);
            } else {
                println!("{} is already yours", ownership.listing_id);
            }
        }
        Commands::Invite {
            listing,
            email,
            role,
            permissions,
            title,
            message,
        } => {
            let request = CreateInvitationRequest {
                email,
                role,
                permissions,
                title,
                message,
            };
            let created = client.invite(&listing, &request).await?;
            print_invitation(&created.invitation);
            println!("Accept link: {}", created.accept_url);
        }
        Commands::Invitations { listing, status } => {
            let invitations = client.invitations(&listing, status.as_deref()).await?;
            if invitations.is_empty() {
                println!("No invitations found.");
            } else {
                println!("Invitations:");
                println!("{:─<60}", "");
                for invitation in &invitations {
                    print_invitation(invitation);
                }
            }
        }
        Commands::Cancel { invitation } => print_invitation(&client.cancel(invitation).await?),
        Commands::Resend { invitation } => {
            let invitation = client.resend(invitation).await?;
            println!("Resent invitation to {}", invitation.email);
        }
        Commands::Preview { token } => {
            let preview = client.preview(&token).await?;
            println!("Listing:     {}", preview.listing_id);
            println!("Role:        {}", preview.role);
            if let Some(title) = &preview.title {
                println!("Title:       {}", title);
            }
            println!("Permissions: {}", preview.permissions.join(", "));
            if let Some(message) = &preview.message {
                println!("Message:     {}", message);
            }
            println!(
                "Status:      {} (expires {})",
                preview.status,
                preview.expires_at.format("%Y-%m-%d %H:%M")
            );
        }
        Commands::Accept { token } => print_change(&client.accept(&token).await?),
        Commands::Decline { token, reason } => {
            print_invitation(&client.decline(&token, reason).await?)
        }
        Commands::Cohosts { listing } => {
            let delegations = client.delegations(&listing).await?;
            if delegations.is_empty() {
                println!("No co-hosts found.");
            } else {
                println!("Co-hosts:");
                println!("{:─<60}", "");
                for delegation in &delegations {
                    print_delegation(delegation);
                }
            }
        }
        Commands::Suspend { delegation } => {
            print_change(&client.lifecycle(delegation, "suspend").await?)
        }
        Commands::Reinstate { delegation } => {
            print_change(&client.lifecycle(delegation, "reinstate").await?)
        }
        Commands::Remove { delegation } => {
            print_change(&client.lifecycle(delegation, "remove").await?)
        }
        Commands::SetPermissions {
            delegation,
            permissions,
        } => print_delegation(&client.set_permissions(delegation, permissions).await?),
        Commands::Authorize {
            listing,
            capability,
        } => {
            let answer = client.authorize(&listing, &capability).await?;
            if answer.allowed {
                println!("allowed (via {})", answer.via);
            } else {
                println!("denied");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_invitation(invitation: &Invitation) {
    println!(
        "  {} - {} [{}] {} (expires {})",
        invitation.id,
        invitation.email,
        invitation.role,
        invitation.status,
        invitation.expires_at.format("%Y-%m-%d %H:%M")
    );
    println!("      permissions: {}", invitation.permissions.join(", "));
    if let Some(reason) = &invitation.decline_reason {
        println!("      declined: {}", reason);
    }
}

fn print_delegation(delegation: &Delegation) {
    let label = delegation.title.as_deref().unwrap_or(&delegation.role);
    println!(
        "  {} - {} ({}) {} since {}",
        delegation.id,
        delegation.co_host_user_id,
        label,
        delegation.status,
        delegation.accepted_at.format("%Y-%m-%d %H:%M")
    );
    println!("      permissions: {}", delegation.permissions.join(", "));
    if let Some(at) = delegation.last_active_at {
        println!("      last active: {}", at.format("%Y-%m-%d %H:%M"));
    }
}

fn print_change(change: &DelegationChange) {
    print_delegation(&change.delegation);
    if !change.changed {
        println!("(no change)");
    }
}
