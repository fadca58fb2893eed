/// Interactive deployment menu
use k8s_openapi::api::apps::v1::Deployment;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::k8s::deployments::{DeploymentError, DeploymentManager, DeploymentRequest};
use crate::k8s::store::ObjectStore;

/// Entries of the numeric menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    List,
    Create,
    Update,
    Delete,
    Exit,
}

impl MenuChoice {
    /// Parse the number typed at the menu prompt
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().parse::<u32>().ok()? {
            1 => Some(MenuChoice::List),
            2 => Some(MenuChoice::Create),
            3 => Some(MenuChoice::Update),
            4 => Some(MenuChoice::Delete),
            5 => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

const MENU: &str = "\nChoose an action:\n\
                    1) List deployments\n\
                    2) Create deployment\n\
                    3) Update deployment\n\
                    4) Delete deployment\n\
                    5) Exit";

/// Whether the menu loop keeps going after an action
enum Flow {
    Continue,
    Exit,
}

/// Reads choices from `input`, runs them against the cluster, reports to `output`
///
/// Failed operations are reported and the menu is shown again; only choosing
/// exit or reaching the end of input ends the loop.
pub struct Menu<R, W, S> {
    input: R,
    output: W,
    manager: DeploymentManager<S>,
    namespace: String,
}

impl<R, W, S> Menu<R, W, S>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    S: ObjectStore<Deployment>,
{
    pub fn new(
        input: R,
        output: W,
        manager: DeploymentManager<S>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            input,
            output,
            manager,
            namespace: namespace.into(),
        }
    }

    /// Run the menu until the user exits
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            writeln!(self.output, "{}", MENU)?;
            let Some(line) = self.prompt("Enter your choice: ").await? else {
                break;
            };

            let flow = match MenuChoice::parse(&line) {
                Some(MenuChoice::List) => self.list().await?,
                Some(MenuChoice::Create) => self.create().await?,
                Some(MenuChoice::Update) => self.update().await?,
                Some(MenuChoice::Delete) => self.delete().await?,
                Some(MenuChoice::Exit) => Flow::Exit,
                None => {
                    writeln!(
                        self.output,
                        "Invalid choice. Please enter a number between 1 and 5."
                    )?;
                    Flow::Continue
                }
            };

            if let Flow::Exit = flow {
                break;
            }
        }

        writeln!(self.output, "Exiting...")?;
        Ok(())
    }

    /// Print `message` and read one trimmed line; `None` at end of input
    async fn prompt(&mut self, message: &str) -> anyhow::Result<Option<String>> {
        write!(self.output, "{}", message)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            debug!("End of input");
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Read name, image and replica count
    ///
    /// `None` if input ended or the replica count is not a number.
    async fn prompt_request(
        &mut self,
        name_prompt: &str,
        image_prompt: &str,
        replicas_prompt: &str,
    ) -> anyhow::Result<Option<DeploymentRequest>> {
        let Some(name) = self.prompt(name_prompt).await? else {
            return Ok(None);
        };
        let Some(image) = self.prompt(image_prompt).await? else {
            return Ok(None);
        };
        let Some(replicas) = self.prompt(replicas_prompt).await? else {
            return Ok(None);
        };

        match replicas.parse::<i32>() {
            Ok(replicas) => Ok(Some(DeploymentRequest::new(name, image, replicas))),
            Err(_) => {
                writeln!(self.output, "Invalid number of replicas: {:?}", replicas)?;
                Ok(None)
            }
        }
    }

    fn report(&mut self, what: &str, err: DeploymentError) -> anyhow::Result<()> {
        writeln!(self.output, "{}: {:#}", what, anyhow::Error::new(err))?;
        Ok(())
    }

    async fn list(&mut self) -> anyhow::Result<Flow> {
        match self.manager.list().await {
            Ok(names) => {
                writeln!(
                    self.output,
                    "Listing deployments in {} namespace:",
                    self.namespace
                )?;
                for name in names {
                    writeln!(self.output, "{}", name)?;
                }
            }
            Err(e) => self.report("Failed to list deployments", e)?,
        }
        Ok(Flow::Continue)
    }

    async fn create(&mut self) -> anyhow::Result<Flow> {
        let Some(request) = self
            .prompt_request(
                "Enter deployment name: ",
                "Enter container image (e.g., nginx:1.12): ",
                "Enter number of replicas: ",
            )
            .await?
        else {
            return Ok(Flow::Continue);
        };

        writeln!(self.output, "Creating deployment...")?;
        match self.manager.create(&request).await {
            Ok(name) => writeln!(self.output, "Created deployment {:?}.", name)?,
            Err(e) => self.report("Failed to create deployment", e)?,
        }
        Ok(Flow::Continue)
    }

    async fn update(&mut self) -> anyhow::Result<Flow> {
        let Some(request) = self
            .prompt_request(
                "Enter the name of the deployment to update: ",
                "Enter new container image (e.g., nginx:1.13): ",
                "Enter new number of replicas: ",
            )
            .await?
        else {
            return Ok(Flow::Continue);
        };

        writeln!(self.output, "Updating deployment...")?;
        match self.manager.update(&request).await {
            Ok(_) => writeln!(self.output, "Deployment has been updated.")?,
            Err(e) => self.report("Update failed", e)?,
        }
        Ok(Flow::Continue)
    }

    async fn delete(&mut self) -> anyhow::Result<Flow> {
        let Some(name) = self
            .prompt("Enter the name of the deployment to delete: ")
            .await?
        else {
            return Ok(Flow::Continue);
        };

        writeln!(self.output, "Deleting deployment...")?;
        match self.manager.delete(&name).await {
            Ok(()) => writeln!(self.output, "Deleted deployment.")?,
            Err(e) => self.report("Failed to delete deployment", e)?,
        }
        Ok(Flow::Continue)
    }
}
