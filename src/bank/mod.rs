//! Question bank: the read-only task → questions mapping every session draws from.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::instrument;
use url::Url;

use crate::error::{BankError, QuizError};

pub mod question;

use question::{Question, TaskId};

/// Anything sessions can pull tasks from.
pub trait RetrieveTasks {
    fn retrieve_task(&self, id: &TaskId) -> Result<Arc<Vec<Question>>, QuizError>;

    fn retrieve_task_ids(&self) -> Result<Vec<TaskId>, QuizError>;
}

#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    tasks: BTreeMap<TaskId, Arc<Vec<Question>>>,
}

impl QuestionBank {
    pub fn new(tasks: impl IntoIterator<Item = (TaskId, Vec<Question>)>) -> Result<Self, BankError> {
        let mut bank = BTreeMap::new();
        for (task, questions) in tasks {
            let mut seen = HashSet::new();
            for question in &questions {
                question
                    .validate()
                    .map_err(|reason| BankError::InvalidQuestion {
                        task: task.clone(),
                        question: question.id().to_string(),
                        reason,
                    })?;
                if !seen.insert(question.id().clone()) {
                    return Err(BankError::InvalidQuestion {
                        task: task.clone(),
                        question: question.id().to_string(),
                        reason: "duplicate question id".to_string(),
                    });
                }
            }
            bank.insert(task, Arc::new(questions));
        }
        Ok(Self { tasks: bank })
    }

    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let raw: BTreeMap<TaskId, Vec<Question>> = serde_json::from_str(json)?;
        Self::new(raw)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn question_count(&self) -> usize {
        self.tasks.values().map(|questions| questions.len()).sum()
    }
}

impl RetrieveTasks for QuestionBank {
    fn retrieve_task(&self, id: &TaskId) -> Result<Arc<Vec<Question>>, QuizError> {
        self.tasks
            .get(id)
            .cloned()
            .ok_or_else(|| QuizError::UnknownTask(id.clone()))
    }

    /// Task ids with numeric ids first, in numeric order.
    fn retrieve_task_ids(&self) -> Result<Vec<TaskId>, QuizError> {
        let mut ids: Vec<TaskId> = self.tasks.keys().cloned().collect();
        ids.sort_by_key(|id| (id.as_str().parse::<u64>().unwrap_or(u64::MAX), id.clone()));
        Ok(ids)
    }
}

/// Where the bank JSON lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankSource {
    File(PathBuf),
    Remote(Url),
}

impl BankSource {
    pub fn parse(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => BankSource::Remote(url),
            _ => BankSource::File(PathBuf::from(location)),
        }
    }

    #[instrument(level = "info")]
    pub async fn load(&self) -> Result<QuestionBank, BankError> {
        let json = match self {
            BankSource::File(path) => tokio::fs::read_to_string(path).await?,
            BankSource::Remote(url) => {
                reqwest::get(url.clone())
                    .await?
                    .error_for_status()?
                    .text()
                    .await?
            }
        };
        QuestionBank::from_json(&json)
    }
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Loading,
    Ready(Arc<QuestionBank>),
    Failed(String),
}

/// Shared view of a bank that may still be loading.
#[derive(Debug, Clone)]
pub struct BankHandle {
    state: watch::Receiver<LoadState>,
}

impl BankHandle {
    pub fn pending() -> (watch::Sender<LoadState>, Self) {
        let (tx, rx) = watch::channel(LoadState::Loading);
        (tx, Self { state: rx })
    }

    /// Starts loading in the background and returns immediately.
    pub fn spawn_load(source: BankSource) -> Self {
        let (tx, handle) = Self::pending();
        tokio::spawn(async move {
            let state = match source.load().await {
                Ok(bank) => {
                    tracing::info!(
                        tasks = bank.task_count(),
                        questions = bank.question_count(),
                        "question bank loaded"
                    );
                    LoadState::Ready(Arc::new(bank))
                }
                Err(e) => {
                    tracing::error!(source = ?source, error = %e, "failed to load question bank");
                    LoadState::Failed(e.to_string())
                }
            };
            tx.send_replace(state);
        });
        handle
    }

    pub fn current(&self) -> Result<Arc<QuestionBank>, QuizError> {
        match &*self.state.borrow() {
            LoadState::Loading => Err(QuizError::BankNotLoaded),
            LoadState::Ready(bank) => Ok(bank.clone()),
            LoadState::Failed(reason) => Err(QuizError::BankUnavailable(reason.clone())),
        }
    }

    /// Resolves once loading has finished, successfully or not.
    pub async fn wait_loaded(&self) -> Result<Arc<QuestionBank>, QuizError> {
        let mut rx = self.state.clone();
        // A dropped sender while still loading means the loader task died.
        if rx
            .wait_for(|state| !matches!(state, LoadState::Loading))
            .await
            .is_err()
        {
            return Err(QuizError::BankUnavailable("loader stopped".to_string()));
        }
        self.current()
    }
}

impl RetrieveTasks for BankHandle {
    fn retrieve_task(&self, id: &TaskId) -> Result<Arc<Vec<Question>>, QuizError> {
        self.current()?.retrieve_task(id)
    }

    fn retrieve_task_ids(&self) -> Result<Vec<TaskId>, QuizError> {
        self.current()?.retrieve_task_ids()
    }
}
