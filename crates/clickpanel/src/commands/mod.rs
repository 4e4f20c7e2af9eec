use anyhow::{Context, Result, anyhow, bail};
use clickpanel_app::{AuthSession, OAuthBackend, Panel, ResourceBackend};
use clickpanel_core::{ListId, NodeKey, NodeKind, TaskId};

use crate::Command;

mod render;

pub async fn run<O: OAuthBackend, B: ResourceBackend>(
    command: Command,
    panel: &Panel<O, B>,
) -> Result<()> {
    match command {
        Command::Login => bail!("login does not need a session"),
        Command::Callback { url } => {
            let outcome = panel
                .accept_redirect(&url)
                .await?
                .ok_or_else(|| anyhow!("redirect URL carries no authorization code"))?;
            println!("signed in to workspace {}", outcome.session.workspace_id());
            println!("continue at: {}", outcome.cleaned_url);
        }
        Command::Status => match panel.restore() {
            Some(session) => println!("{}", render::session(&session)),
            None => println!("not signed in"),
        },
        Command::Logout => {
            panel.sign_out()?;
            println!("signed out");
        }
        Command::Spaces => {
            require_session(panel)?;
            print!("{}", render::nodes(&panel.spaces().await));
        }
        Command::Folders { space } => {
            require_session(panel)?;
            let space = node_key(NodeKind::Space, &space)?;
            print!("{}", render::nodes(&panel.folders(&space).await));
        }
        Command::Lists { space, folder } => {
            require_session(panel)?;
            let parent = match (space, folder) {
                (Some(space), None) => node_key(NodeKind::Space, &space)?,
                (None, Some(folder)) => node_key(NodeKind::Folder, &folder)?,
                _ => bail!("pass exactly one of --space or --folder"),
            };
            print!("{}", render::nodes(&panel.lists(&parent).await));
        }
        Command::Tree => {
            require_session(panel)?;
            print_tree(panel).await;
        }
        Command::Tasks { list } => {
            require_session(panel)?;
            let list = list_id(&list)?;
            let tasks = panel.tasks(&list).await?;
            print!("{}", render::task_groups(&tasks));
        }
        Command::Show { task, list } => {
            require_session(panel)?;
            let task = TaskId::new(task).context("task id must not be empty")?;
            let detail = panel.open_task(&task).await?;
            let color = match list {
                Some(list) => {
                    let list = list_id(&list)?;
                    panel.statuses(&list).await;
                    panel
                        .status_catalog()
                        .color_for(&list, &detail.status.label)
                }
                None => detail.status.color.clone(),
            };
            print!("{}", render::task(&detail, color.as_deref()));
        }
        Command::Statuses { list } => {
            require_session(panel)?;
            let list = list_id(&list)?;
            print!("{}", render::statuses(&panel.statuses(&list).await));
        }
    }
    Ok(())
}

fn require_session<O: OAuthBackend, B: ResourceBackend>(
    panel: &Panel<O, B>,
) -> Result<AuthSession> {
    panel.restore().ok_or_else(|| {
        anyhow!("not signed in; run `clickpanel login` and then `clickpanel callback`")
    })
}

fn node_key(kind: NodeKind, raw: &str) -> Result<NodeKey> {
    NodeKey::new(kind, raw.trim()).with_context(|| format!("invalid {kind} id: {raw:?}"))
}

fn list_id(raw: &str) -> Result<ListId> {
    ListId::new(raw.trim()).with_context(|| format!("invalid list id: {raw:?}"))
}

async fn print_tree<O: OAuthBackend, B: ResourceBackend>(panel: &Panel<O, B>) {
    for space in panel.spaces().await.iter() {
        println!("{}", render::node_line(space, 0));
        for folder in panel.folders(space.key()).await.iter() {
            println!("{}", render::node_line(folder, 1));
            for list in panel.lists(folder.key()).await.iter() {
                println!("{}", render::node_line(list, 2));
            }
        }
        // Folder lists were already printed; keep the ones parented to the space.
        for list in panel.lists(space.key()).await.iter() {
            if list.parent() == Some(space.key()) {
                println!("{}", render::node_line(list, 1));
            }
        }
    }
}
