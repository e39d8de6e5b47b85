//! In-crate test doubles for the workflow collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::DatabaseError;
use crate::llm::{ModelClient, ModelError};

use super::checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore, StoreError};
use super::hooks::{CompletionHook, PersistenceError};
use super::state::WorkflowState;

pub(crate) const GOOD_TEXT: &str = "Contrato de arrendamiento de vivienda entre el propietario \
    y el inquilino, con una duración de doce meses y una renta mensual pagadera \
    dentro de los primeros cinco días de cada mes.";

pub(crate) const CLASSIFICATION_REPLY: &str =
    "TIPO: Contrato de arrendamiento\nCATEGORÍA: LEGAL\nIDIOMA: es";

pub(crate) const ANALYSIS_REPLY: &str = "RESUMEN:\n1. Alquilas una vivienda por doce meses.\n\
    2. Pagas la renta cada mes.\n3. El pago vence el día cinco.\n\n\
    LETRA CHICA / RIESGOS:\n- Recargo por pago tardío.\n- Fianza de dos meses.\n\n\
    PRÓXIMOS PASOS:\n- Pide un recibo de cada pago.";

/// Returns the same reply (or a connection error) on every call.
pub(crate) struct FakeModel {
    reply: Option<String>,
    calls: AtomicUsize,
    temperatures: Mutex<Vec<f32>>,
}

impl FakeModel {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            temperatures: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            temperatures: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn temperatures(&self) -> Vec<f32> {
        self.temperatures.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for FakeModel {
    async fn complete(
        &self,
        _system_instruction: &str,
        _user_message: &str,
        temperature: f32,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.temperatures.lock().unwrap().push(temperature);
        self.reply
            .clone()
            .ok_or_else(|| ModelError::Connection("fake endpoint".to_string()))
    }
}

/// Remembers every state it is called with.
#[derive(Default)]
pub(crate) struct RecordingHook {
    seen: Mutex<Vec<WorkflowState>>,
    fail: bool,
}

impl RecordingHook {
    pub(crate) fn failing() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn seen(&self) -> Vec<WorkflowState> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionHook for RecordingHook {
    async fn on_analysis_complete(&self, state: &WorkflowState) -> Result<(), PersistenceError> {
        self.seen.lock().unwrap().push(state.clone());
        if self.fail {
            return Err(PersistenceError::PersistenceFailed(DatabaseError::busy()));
        }
        Ok(())
    }
}

/// Memory store whose n-th save (1-based) fails once with `SQLITE_BUSY`.
pub(crate) struct FlakyStore {
    inner: MemoryCheckpointStore,
    saves: AtomicUsize,
    fail_on_save: usize,
}

impl FlakyStore {
    pub(crate) fn failing_save(n: usize) -> Self {
        Self {
            inner: MemoryCheckpointStore::new(),
            saves: AtomicUsize::new(0),
            fail_on_save: n,
        }
    }
}

#[async_trait]
impl CheckpointStore for FlakyStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        self.inner.load(thread_id).await
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on_save {
            return Err(StoreError::Database(DatabaseError::busy()));
        }
        self.inner.save(checkpoint).await
    }
}
