//! Progress events emitted while a run executes

use std::fmt;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ProjectStarted {
        project: String,
    },
    ProjectBlocked {
        project: String,
        failed: String,
    },
    ImageBuilding {
        project: String,
        image: String,
    },
    ImageBuilt {
        project: String,
        image: String,
        tag: String,
    },
    ImageSkipped {
        project: String,
        image: String,
    },
    DeploymentStarted {
        project: String,
        deployment: String,
    },
    Deployed {
        project: String,
        deployment: String,
    },
    DeploymentSkipped {
        project: String,
        deployment: String,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectStarted { project } => write!(f, "[{}] starting", project),
            Self::ProjectBlocked { project, failed } => {
                write!(f, "[{}] blocked by failed dependency {}", project, failed)
            }
            Self::ImageBuilding { project, image } => {
                write!(f, "[{}] building image {}", project, image)
            }
            Self::ImageBuilt {
                project,
                image,
                tag,
            } => write!(f, "[{}] built image {} ({})", project, image, tag),
            Self::ImageSkipped { project, image } => {
                write!(f, "[{}] image {} up to date", project, image)
            }
            Self::DeploymentStarted {
                project,
                deployment,
            } => write!(f, "[{}] deploying {}", project, deployment),
            Self::Deployed {
                project,
                deployment,
            } => write!(f, "[{}] deployed {}", project, deployment),
            Self::DeploymentSkipped {
                project,
                deployment,
            } => write!(f, "[{}] deployment {} up to date", project, deployment),
        }
    }
}

/// Callback receiving run events
pub type Observer<'a> = &'a (dyn Fn(&Event) + Send + Sync);
