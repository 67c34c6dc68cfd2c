//! In-process revision store.
//!
//! [`MemoryStore`] implements the document registry, edit queue and approval
//! workflow without external persistence. It is safe to share across threads
//! (`Arc<MemoryStore>`).
//!
//! Locking:
//! - every document has a writer mutex serializing approve/reject, so two
//!   moderators can never both read the same current version and each
//!   append a revision on top of it;
//! - document state sits behind an `RwLock`; readers only contend with the
//!   short commit step that appends a version and moves the pointer;
//! - edits live in a separate `RwLock` map. Commit holds the document state
//!   write lock and the edit map write lock together, always in that order.
//!
//! Proposing an edit never takes the writer mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::diff::{compute_line_diff, DiffLine, DiffPayload};
use crate::document::{Document, NewDocument, Version, INITIAL_REVISION};
use crate::edit::{self, EditStatus, ProposedEdit};
use crate::error::CoreError;
use crate::hashing::text_hash;
use crate::types::{DbId, Revision};

struct DocumentState {
    document: Document,
    /// Ordered by revision; the last entry is always the current version.
    versions: Vec<Version>,
}

impl DocumentState {
    fn current(&self) -> Result<&Version, CoreError> {
        self.versions.last().ok_or_else(|| {
            CoreError::Internal(format!("document {} has no versions", self.document.id))
        })
    }

    fn by_revision(&self, revision: Revision) -> Result<&Version, CoreError> {
        self.versions
            .iter()
            .find(|v| v.revision == revision)
            .ok_or(CoreError::NotFound {
                entity: "Revision",
                id: DbId::from(revision),
            })
    }
}

struct DocumentSlot {
    writer: Mutex<()>,
    state: RwLock<DocumentState>,
}

/// Thread-safe in-memory implementation of the revision store.
pub struct MemoryStore {
    next_id: AtomicI64,
    documents: RwLock<HashMap<DbId, Arc<DocumentSlot>>>,
    edits: RwLock<HashMap<DbId, ProposedEdit>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            documents: RwLock::new(HashMap::new()),
            edits: RwLock::new(HashMap::new()),
        }
    }

    fn allocate_id(&self) -> DbId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn slot(&self, document_id: DbId) -> Result<Arc<DocumentSlot>, CoreError> {
        read(&self.documents)?
            .get(&document_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "Document",
                id: document_id,
            })
    }

    // -----------------------------------------------------------------------
    // Document registry
    // -----------------------------------------------------------------------

    /// Create a document and its revision-1 version.
    pub fn create_document(&self, input: &NewDocument) -> Result<Document, CoreError> {
        input.check()?;

        let document_id = self.allocate_id();
        let version_id = self.allocate_id();
        let now = Utc::now();

        let version = Version {
            id: version_id,
            document_id,
            revision: INITIAL_REVISION,
            text_hash: text_hash(&input.initial_text),
            text: input.initial_text.clone(),
            author_id: input.author_id,
            created_at: now,
        };
        let document = Document {
            id: document_id,
            group_id: input.group_id,
            title: input.title.clone(),
            artist: input.artist.clone(),
            arrangement: input.arrangement_name().to_string(),
            author_id: input.author_id,
            current_version_id: version_id,
            created_at: now,
        };

        let slot = Arc::new(DocumentSlot {
            writer: Mutex::new(()),
            state: RwLock::new(DocumentState {
                document: document.clone(),
                versions: vec![version],
            }),
        });
        write(&self.documents)?.insert(document_id, slot);

        tracing::info!(document_id, group_id = input.group_id, "Document created");
        Ok(document)
    }

    pub fn get_document(&self, document_id: DbId) -> Result<Document, CoreError> {
        let slot = self.slot(document_id)?;
        let state = read(&slot.state)?;
        Ok(state.document.clone())
    }

    pub fn get_current_version(&self, document_id: DbId) -> Result<Version, CoreError> {
        let slot = self.slot(document_id)?;
        let state = read(&slot.state)?;
        state.current().cloned()
    }

    /// All versions of a document, oldest first.
    pub fn get_history(&self, document_id: DbId) -> Result<Vec<Version>, CoreError> {
        let slot = self.slot(document_id)?;
        let state = read(&slot.state)?;
        Ok(state.versions.clone())
    }

    pub fn get_version(&self, document_id: DbId, revision: Revision) -> Result<Version, CoreError> {
        let slot = self.slot(document_id)?;
        let state = read(&slot.state)?;
        state.by_revision(revision).cloned()
    }

    /// Line-by-line comparison of two stored revisions.
    pub fn compare_revisions(
        &self,
        document_id: DbId,
        from: Revision,
        to: Revision,
    ) -> Result<Vec<DiffLine>, CoreError> {
        let slot = self.slot(document_id)?;
        let state = read(&slot.state)?;
        let old = state.by_revision(from)?;
        let new = state.by_revision(to)?;
        Ok(compute_line_diff(&old.text, &new.text))
    }

    // -----------------------------------------------------------------------
    // Edit queue
    // -----------------------------------------------------------------------

    /// Queue a diff computed against `base_version_id` for moderation.
    pub fn propose(
        &self,
        document_id: DbId,
        base_version_id: DbId,
        diff: DiffPayload,
        proposer_id: DbId,
    ) -> Result<ProposedEdit, CoreError> {
        let slot = self.slot(document_id)?;
        {
            let state = read(&slot.state)?;
            let base = state
                .versions
                .iter()
                .find(|v| v.id == base_version_id)
                .ok_or(CoreError::NotFound {
                    entity: "Version",
                    id: base_version_id,
                })?;
            edit::check_proposal(&base.text, &diff)?;
        }

        let proposal = ProposedEdit {
            id: self.allocate_id(),
            document_id,
            base_version_id,
            diff,
            proposer_id,
            status: EditStatus::Pending,
            moderator_id: None,
            decided_at: None,
            rejection_reason: None,
            result_version_id: None,
            submitted_at: Utc::now(),
        };
        write(&self.edits)?.insert(proposal.id, proposal.clone());

        let summary = proposal.diff.summary();
        tracing::info!(
            edit_id = proposal.id,
            document_id,
            base_version_id,
            proposer_id,
            lines_added = summary.lines_added,
            lines_removed = summary.lines_removed,
            "Edit proposed",
        );
        Ok(proposal)
    }

    /// Queue an edit that restores the text of an earlier revision.
    pub fn propose_revert(
        &self,
        document_id: DbId,
        target_revision: Revision,
        proposer_id: DbId,
    ) -> Result<ProposedEdit, CoreError> {
        let (current_id, diff) = {
            let slot = self.slot(document_id)?;
            let state = read(&slot.state)?;
            let current = state.current()?;
            let target = state.by_revision(target_revision)?;
            if current.text_hash == target.text_hash {
                return Err(CoreError::Validation(format!(
                    "Revision {target_revision} already matches the current text"
                )));
            }
            (
                current.id,
                crate::diff::compute_diff(&current.text, &target.text),
            )
        };
        self.propose(document_id, current_id, diff, proposer_id)
    }

    pub fn get_edit(&self, edit_id: DbId) -> Result<ProposedEdit, CoreError> {
        read(&self.edits)?
            .get(&edit_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "ProposedEdit",
                id: edit_id,
            })
    }

    /// Pending edits for a document, oldest submission first.
    pub fn list_pending(&self, document_id: DbId) -> Result<Vec<ProposedEdit>, CoreError> {
        self.collect_edits(document_id, |e| e.status == EditStatus::Pending)
    }

    /// Every edit ever proposed for a document, oldest submission first.
    pub fn list_edits(&self, document_id: DbId) -> Result<Vec<ProposedEdit>, CoreError> {
        self.collect_edits(document_id, |_| true)
    }

    fn collect_edits(
        &self,
        document_id: DbId,
        keep: impl Fn(&ProposedEdit) -> bool,
    ) -> Result<Vec<ProposedEdit>, CoreError> {
        self.slot(document_id)?;
        let mut edits: Vec<ProposedEdit> = read(&self.edits)?
            .values()
            .filter(|e| e.document_id == document_id && keep(e))
            .cloned()
            .collect();
        edits.sort_by_key(|e| (e.submitted_at, e.id));
        Ok(edits)
    }

    // -----------------------------------------------------------------------
    // Approval workflow
    // -----------------------------------------------------------------------

    /// Approve a pending edit, producing the next revision.
    ///
    /// Fails with [`CoreError::Conflict`] if the current text no longer
    /// matches the diff's base; the edit then stays pending.
    pub fn approve(&self, edit_id: DbId, moderator_id: DbId) -> Result<Version, CoreError> {
        let document_id = self.get_edit(edit_id)?.document_id;
        let slot = self.slot(document_id)?;
        let _writer = slot.writer.lock().map_err(|_| poisoned())?;

        // Re-read under the writer lock; another moderator may have resolved it.
        let proposal = self.get_edit(edit_id)?;
        edit::ensure_pending(edit_id, proposal.status)?;

        let current = read(&slot.state)?.current()?.clone();
        let text = edit::rebase_onto(&proposal, &current).inspect_err(|err| {
            tracing::warn!(edit_id, document_id, error = %err, "Edit approval failed");
        })?;

        let now = Utc::now();
        let version = Version {
            id: self.allocate_id(),
            document_id,
            revision: current.revision + 1,
            text_hash: text_hash(&text),
            text,
            author_id: proposal.proposer_id,
            created_at: now,
        };

        {
            let mut state = write(&slot.state)?;
            let mut edits = write(&self.edits)?;
            let record = edits.get_mut(&edit_id).ok_or(CoreError::NotFound {
                entity: "ProposedEdit",
                id: edit_id,
            })?;
            record.mark_approved(moderator_id, version.id, now)?;
            state.document.current_version_id = version.id;
            state.versions.push(version.clone());
        }

        tracing::info!(
            edit_id,
            document_id,
            moderator_id,
            revision = version.revision,
            "Edit approved",
        );
        Ok(version)
    }

    /// Reject a pending edit. The document is left untouched.
    pub fn reject(
        &self,
        edit_id: DbId,
        moderator_id: DbId,
        reason: &str,
    ) -> Result<ProposedEdit, CoreError> {
        let document_id = self.get_edit(edit_id)?.document_id;
        let slot = self.slot(document_id)?;
        let _writer = slot.writer.lock().map_err(|_| poisoned())?;

        let rejected = {
            let mut edits = write(&self.edits)?;
            let record = edits.get_mut(&edit_id).ok_or(CoreError::NotFound {
                entity: "ProposedEdit",
                id: edit_id,
            })?;
            record.mark_rejected(moderator_id, reason, Utc::now())?;
            record.clone()
        };

        tracing::info!(edit_id, document_id, moderator_id, "Edit rejected");
        Ok(rejected)
    }
}

fn poisoned() -> CoreError {
    CoreError::Internal("revision store lock poisoned".into())
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, CoreError> {
    lock.read().map_err(|_| poisoned())
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, CoreError> {
    lock.write().map_err(|_| poisoned())
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use assert_matches::assert_matches;

    use super::*;
    use crate::diff::compute_diff;
    use crate::document::DEFAULT_ARRANGEMENT;

    const MODERATOR: DbId = 900;
    const PROPOSER: DbId = 500;

    fn store_with(text: &str) -> (MemoryStore, Document) {
        let store = MemoryStore::new();
        let doc = store
            .create_document(&NewDocument {
                group_id: 1,
                title: "Blowin' in the Wind".into(),
                artist: Some("Bob Dylan".into()),
                arrangement: None,
                author_id: 7,
                initial_text: text.into(),
            })
            .unwrap();
        (store, doc)
    }

    /// Propose and approve `target` on top of the current version.
    fn advance(store: &MemoryStore, doc: &Document, target: &str) -> Version {
        let current = store.get_current_version(doc.id).unwrap();
        let edit = store
            .propose(doc.id, current.id, compute_diff(&current.text, target), PROPOSER)
            .unwrap();
        store.approve(edit.id, MODERATOR).unwrap()
    }

    fn assert_history_matches_revision(store: &MemoryStore, doc: &Document) {
        let history = store.get_history(doc.id).unwrap();
        let current = store.get_current_version(doc.id).unwrap();
        assert_eq!(history.len(), current.revision as usize);
        assert_eq!(history.last().unwrap(), &current);
        assert_eq!(store.get_document(doc.id).unwrap().current_version_id, current.id);
    }

    // -- registry ------------------------------------------------------------

    #[test]
    fn create_document_starts_at_revision_one() {
        let (store, doc) = store_with("How many roads\n");
        let current = store.get_current_version(doc.id).unwrap();
        assert_eq!(current.revision, 1);
        assert_eq!(current.text, "How many roads\n");
        assert_eq!(doc.current_version_id, current.id);
        assert_eq!(doc.arrangement, DEFAULT_ARRANGEMENT);
        assert_history_matches_revision(&store, &doc);
    }

    #[test]
    fn create_document_with_empty_text_fails() {
        let store = MemoryStore::new();
        let result = store.create_document(&NewDocument {
            group_id: 1,
            title: "Empty".into(),
            artist: None,
            arrangement: None,
            author_id: 7,
            initial_text: String::new(),
        });
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn unknown_document_not_found() {
        let store = MemoryStore::new();
        assert_matches!(
            store.get_current_version(404),
            Err(CoreError::NotFound { entity: "Document", id: 404 })
        );
        assert_matches!(store.get_history(404), Err(CoreError::NotFound { .. }));
        assert_matches!(store.list_pending(404), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn history_is_oldest_first_and_restartable() {
        let (store, doc) = store_with("v1\n");
        advance(&store, &doc, "v2\n");
        advance(&store, &doc, "v3\n");
        let first = store.get_history(doc.id).unwrap();
        let second = store.get_history(doc.id).unwrap();
        assert_eq!(first, second);
        let revisions: Vec<_> = first.iter().map(|v| v.revision).collect();
        assert_eq!(revisions, vec![1, 2, 3]);
        assert_history_matches_revision(&store, &doc);
    }

    #[test]
    fn compare_revisions_shows_line_changes() {
        let (store, doc) = store_with("verse\nchorus\n");
        advance(&store, &doc, "verse\nbridge\nchorus\n");
        let lines = store.compare_revisions(doc.id, 1, 2).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].content, "bridge");
        assert_matches!(
            store.compare_revisions(doc.id, 1, 9),
            Err(CoreError::NotFound { entity: "Revision", id: 9 })
        );
    }

    // -- edit queue ------------------------------------------------------------

    #[test]
    fn propose_requires_known_base_version() {
        let (store, doc) = store_with("ABC");
        let diff = compute_diff("ABC", "ABD");
        assert_matches!(
            store.propose(doc.id, 12345, diff.clone(), PROPOSER),
            Err(CoreError::NotFound { entity: "Version", .. })
        );
        assert_matches!(
            store.propose(777, doc.current_version_id, diff, PROPOSER),
            Err(CoreError::NotFound { entity: "Document", .. })
        );
    }

    #[test]
    fn propose_rejects_version_of_another_document() {
        let (store, doc) = store_with("ABC");
        let other = store
            .create_document(&NewDocument {
                group_id: 1,
                title: "Other".into(),
                artist: None,
                arrangement: None,
                author_id: 7,
                initial_text: "ABC".into(),
            })
            .unwrap();
        let result = store.propose(
            doc.id,
            other.current_version_id,
            compute_diff("ABC", "ABD"),
            PROPOSER,
        );
        assert_matches!(result, Err(CoreError::NotFound { entity: "Version", .. }));
    }

    #[test]
    fn propose_rejects_hunk_overflowing_line_index() {
        let (store, doc) = store_with("ABC\n");
        let mut diff = compute_diff("ABC\n", "ABD\n");
        diff.hunks[0].base_start = usize::MAX;
        assert_matches!(
            store.propose(doc.id, doc.current_version_id, diff, PROPOSER),
            Err(CoreError::Validation(_))
        );
        assert!(store.list_pending(doc.id).unwrap().is_empty());
    }

    #[test]
    fn pending_edits_listed_oldest_first() {
        let (store, doc) = store_with("ABC");
        let base = doc.current_version_id;
        let a = store.propose(doc.id, base, compute_diff("ABC", "ABD"), 1).unwrap();
        let b = store.propose(doc.id, base, compute_diff("ABC", "ABE"), 2).unwrap();
        let c = store.propose(doc.id, base, compute_diff("ABC", "ABF"), 3).unwrap();

        let ids: Vec<_> = store.list_pending(doc.id).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);

        store.reject(b.id, MODERATOR, "duplicate").unwrap();
        let ids: Vec<_> = store.list_pending(doc.id).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(store.list_edits(doc.id).unwrap().len(), 3);
    }

    // -- approval workflow --------------------------------------------------------

    #[test]
    fn scenario_second_edit_on_stale_base_conflicts() {
        let (store, doc) = store_with("ABA");
        advance(&store, &doc, "ABB");
        advance(&store, &doc, "ABC");
        let rev3 = store.get_current_version(doc.id).unwrap();
        assert_eq!((rev3.revision, rev3.text.as_str()), (3, "ABC"));

        let first = store
            .propose(doc.id, rev3.id, compute_diff("ABC", "ABD"), 1)
            .unwrap();
        let second = store
            .propose(doc.id, rev3.id, compute_diff("ABC", "ABE"), 2)
            .unwrap();

        let rev4 = store.approve(first.id, MODERATOR).unwrap();
        assert_eq!((rev4.revision, rev4.text.as_str()), (4, "ABD"));
        assert_eq!(rev4.author_id, 1);

        assert_matches!(store.approve(second.id, MODERATOR), Err(CoreError::Conflict(_)));
        assert_eq!(store.get_edit(second.id).unwrap().status, EditStatus::Pending);
        assert_eq!(store.get_current_version(doc.id).unwrap(), rev4);
        assert_history_matches_revision(&store, &doc);
    }

    #[test]
    fn stale_base_rebases_when_text_was_reverted() {
        let (store, doc) = store_with("verse\n");
        let base = doc.current_version_id;
        let pending = store
            .propose(doc.id, base, compute_diff("verse\n", "verse\nchorus\n"), 1)
            .unwrap();

        advance(&store, &doc, "VERSE\n");
        advance(&store, &doc, "verse\n");

        let version = store.approve(pending.id, MODERATOR).unwrap();
        assert_eq!(version.revision, 4);
        assert_eq!(version.text, "verse\nchorus\n");
    }

    #[test]
    fn approve_twice_is_invalid_state() {
        let (store, doc) = store_with("ABC");
        let edit = store
            .propose(doc.id, doc.current_version_id, compute_diff("ABC", "ABD"), 1)
            .unwrap();
        let version = store.approve(edit.id, MODERATOR).unwrap();

        assert_matches!(store.approve(edit.id, MODERATOR), Err(CoreError::InvalidState(_)));
        assert_matches!(store.reject(edit.id, MODERATOR, "late"), Err(CoreError::InvalidState(_)));

        let resolved = store.get_edit(edit.id).unwrap();
        assert_eq!(resolved.status, EditStatus::Approved);
        assert_eq!(resolved.moderator_id, Some(MODERATOR));
        assert_eq!(resolved.result_version_id, Some(version.id));
    }

    #[test]
    fn reject_creates_no_version() {
        let (store, doc) = store_with("ABC");
        let edit = store
            .propose(doc.id, doc.current_version_id, compute_diff("ABC", "ABD"), 1)
            .unwrap();
        let rejected = store.reject(edit.id, MODERATOR, "wrong chord").unwrap();

        assert_eq!(rejected.status, EditStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("wrong chord"));
        assert_eq!(rejected.result_version_id, None);
        assert_eq!(store.get_current_version(doc.id).unwrap().revision, 1);
        assert_eq!(store.get_history(doc.id).unwrap().len(), 1);
        assert_matches!(store.approve(edit.id, MODERATOR), Err(CoreError::InvalidState(_)));
    }

    #[test]
    fn unknown_edit_not_found() {
        let store = MemoryStore::new();
        assert_matches!(
            store.approve(31, MODERATOR),
            Err(CoreError::NotFound { entity: "ProposedEdit", id: 31 })
        );
        assert_matches!(store.reject(31, MODERATOR, "x"), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn revert_goes_through_moderation() {
        let (store, doc) = store_with("one\n");
        advance(&store, &doc, "two\n");

        let revert = store.propose_revert(doc.id, 1, PROPOSER).unwrap();
        assert_eq!(store.get_current_version(doc.id).unwrap().text, "two\n");

        let version = store.approve(revert.id, MODERATOR).unwrap();
        assert_eq!(version.revision, 3);
        assert_eq!(version.text, "one\n");

        assert_matches!(
            store.propose_revert(doc.id, 3, PROPOSER),
            Err(CoreError::Validation(_))
        );
    }

    // -- concurrency -------------------------------------------------------------

    #[test]
    fn concurrent_approvals_on_same_base_never_both_apply() {
        let (store, doc) = store_with("ABC");
        let base = doc.current_version_id;
        let edits: Vec<_> = ["ABD", "ABE", "ABF", "ABG"]
            .iter()
            .enumerate()
            .map(|(i, target)| {
                store
                    .propose(doc.id, base, compute_diff("ABC", target), i as DbId)
                    .unwrap()
            })
            .collect();

        let barrier = Barrier::new(edits.len());
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = edits
                .iter()
                .map(|e| {
                    let store = &store;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        store.approve(e.id, MODERATOR)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let approved = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(CoreError::Conflict(_))))
            .count();
        assert_eq!(approved, 1);
        assert_eq!(conflicts, edits.len() - 1);
        assert_eq!(store.get_current_version(doc.id).unwrap().revision, 2);
        assert_eq!(store.list_pending(doc.id).unwrap().len(), edits.len() - 1);
        assert_history_matches_revision(&store, &doc);
    }

    #[test]
    fn concurrent_sequential_edits_get_distinct_revisions() {
        let (store, doc) = store_with("start\n");
        std::thread::scope(|s| {
            for worker in 0..4 {
                let store = &store;
                let doc = &doc;
                s.spawn(move || {
                    for round in 0..5 {
                        loop {
                            let current = store.get_current_version(doc.id).unwrap();
                            let target =
                                format!("{}worker {worker} round {round}\n", current.text);
                            let diff = compute_diff(&current.text, &target);
                            let edit = store.propose(doc.id, current.id, diff, worker).unwrap();
                            match store.approve(edit.id, MODERATOR) {
                                Ok(_) => break,
                                Err(CoreError::Conflict(_)) => {
                                    store.reject(edit.id, MODERATOR, "stale").unwrap();
                                }
                                Err(other) => panic!("unexpected error: {other}"),
                            }
                        }
                    }
                });
            }
        });

        let history = store.get_history(doc.id).unwrap();
        assert_eq!(history.len(), 21);
        for (idx, version) in history.iter().enumerate() {
            assert_eq!(version.revision as usize, idx + 1);
        }
        assert_history_matches_revision(&store, &doc);
    }
}
