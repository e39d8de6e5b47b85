//! Test harness for isolated workflow execution.
//!
//! The `TestHarness` owns a temporary directory with an on-disk SQLite
//! database and builds the production engine on top of it. Only the model
//! and OCR are replaced, by scripted doubles that count their calls.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use doclara::workflow::{AnalysisRecorder, UserToken};
use doclara::{
    AnalyzeStage, ClassifyStage, Database, DocumentService, Identity, ModelClient, ModelError,
    OcrError, RetryPolicy, SqliteAnalysisRepository, SqliteCheckpointStore, TextExtractor,
    WorkflowEngine,
};

pub const LEASE_TEXT: &str = "CONTRATO DE ARRENDAMIENTO DE VIVIENDA. En Madrid, a 3 de marzo. \
    El arrendador cede al arrendatario el uso de la vivienda situada en la calle Mayor 12 \
    por un plazo de doce meses. La renta mensual es de 800 euros, pagadera dentro de los \
    cinco primeros días de cada mes. El arrendatario entrega una fianza de dos mensualidades.";

pub const LEASE_CLASSIFICATION: &str =
    "TIPO: Contrato de arrendamiento de vivienda\nCATEGORÍA: LEGAL\nIDIOMA: es";

pub const LEASE_ANALYSIS: &str = "RESUMEN:\n\
    1. Alquilas una vivienda en la calle Mayor durante un año.\n\
    2. Pagas 800 euros cada mes.\n\
    3. Debes pagar antes del día cinco.\n\
    \n\
    LETRA CHICA / RIESGOS:\n\
    - La fianza es de dos meses y puede retenerse por daños.\n\
    - Pagar tarde puede suponer un incumplimiento.\n\
    \n\
    PRÓXIMOS PASOS:\n\
    - Haz fotos del estado de la vivienda al entrar.";

/// Model double that answers from a queue, then repeats a default reply.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<Result<String, String>>>,
    default_reply: Result<String, String>,
    calls: AtomicUsize,
    messages: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn always(reply: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default_reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default_reply: Err("connection refused".to_string()),
            calls: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Queues a one-off failure before the default reply.
    pub fn then_fail_once(self) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err("rate limited".to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(
        &self,
        _system_instruction: &str,
        user_message: &str,
        _temperature: f32,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.messages.lock().unwrap().push(user_message.to_string());
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());
        next.map_err(ModelError::Connection)
    }
}

/// OCR double returning fixed text for any image.
pub struct FixedExtractor {
    text: Option<String>,
}

impl FixedExtractor {
    pub fn reading(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn blank() -> Self {
        Self { text: None }
    }
}

impl TextExtractor for FixedExtractor {
    fn extract_text(&self, _image: &[u8]) -> Result<String, OcrError> {
        self.text.clone().ok_or(OcrError::NoTextFound)
    }
}

/// Test harness providing an isolated database and a fully wired service.
pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub classify_model: Arc<ScriptedModel>,
    pub analyze_model: Arc<ScriptedModel>,
    pub service: DocumentService,
}

impl TestHarness {
    /// Harness reading the lease text, with both models answering normally.
    pub fn new() -> Self {
        Self::with(
            FixedExtractor::reading(LEASE_TEXT),
            ScriptedModel::always(LEASE_CLASSIFICATION),
            ScriptedModel::always(LEASE_ANALYSIS),
        )
    }

    pub fn with(
        extractor: FixedExtractor,
        classify_model: ScriptedModel,
        analyze_model: ScriptedModel,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("doclara.db");

        let classify_model = Arc::new(classify_model);
        let analyze_model = Arc::new(analyze_model);
        let service = build_service(&db_path, extractor, &classify_model, &analyze_model);

        Self {
            temp_dir,
            db_path,
            classify_model,
            analyze_model,
            service,
        }
    }

    /// A second service over the same database, as after a process restart.
    pub fn restart(&self, classify_model: ScriptedModel, analyze_model: ScriptedModel) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let classify_model = Arc::new(classify_model);
        let analyze_model = Arc::new(analyze_model);
        let service = build_service(
            &self.db_path,
            FixedExtractor::reading(LEASE_TEXT),
            &classify_model,
            &analyze_model,
        );
        Self {
            temp_dir,
            db_path: self.db_path.clone(),
            classify_model,
            analyze_model,
            service,
        }
    }

    pub fn database(&self) -> Database {
        Database::open(&self.db_path).expect("Failed to open test database")
    }

    pub fn identity(user_id: &str) -> Identity {
        Identity::new(user_id, UserToken::new("eyJhbGciOiJIUzI1NiJ9.test-token"))
            .expect("valid identity")
    }
}

fn build_service(
    db_path: &std::path::Path,
    extractor: FixedExtractor,
    classify_model: &Arc<ScriptedModel>,
    analyze_model: &Arc<ScriptedModel>,
) -> DocumentService {
    let db = Database::open(db_path).expect("Failed to open test database");
    let checkpoints = Arc::new(SqliteCheckpointStore::new(db.clone()));
    let analyses = Arc::new(SqliteAnalysisRepository::new(db));

    let engine = WorkflowEngine::new(
        ClassifyStage::new(classify_model.clone()),
        AnalyzeStage::new(analyze_model.clone()),
        checkpoints,
    )
    .with_hook(Arc::new(AnalysisRecorder::new(analyses.clone())));

    DocumentService::new(
        Arc::new(extractor),
        Arc::new(engine),
        analyses,
        RetryPolicy::new(3, Duration::from_millis(1)),
    )
}
