//! Command-buffer dependency tracing.
//!
//! Reconstructs the ordering guarantees of a command buffer purely from
//! the recorded call stream: explicit sync-point dependencies, implicit
//! in-order chaining, and barrier-induced ordering. The result serializes
//! as a deterministic DOT graph.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::mem;
use std::sync::{Mutex, RwLock};

use crate::api::{cl_sync_point_khr, Handle};

/// Identity of one node in a recording's dependency graph.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeId {
    /// Assigned by the tracer when the caller did not request a sync point.
    Internal(u32),
    /// The sync point the real implementation assigned to the command.
    SyncPoint(cl_sync_point_khr),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Internal(id) => write!(f, "internal{id}"),
            NodeId::SyncPoint(id) => write!(f, "syncpoint{id}"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EdgeKind {
    /// Named by the caller through a sync-point wait list.
    Explicit,
    /// Inferred from recording order or a preceding barrier.
    Implicit,
    /// A barrier subsuming every outstanding node.
    Barrier,
}

enum Statement {
    Command { id: NodeId, label: String },
    Barrier { id: NodeId, label: String },
    Edge { from: NodeId, to: NodeId, kind: EdgeKind },
}

/// One command buffer's recording between creation and finalize.
struct Session {
    in_order: bool,
    next_internal: u32,
    statements: Vec<Statement>,
    implicit_deps: Vec<NodeId>,
    outstanding: Vec<NodeId>,
}

impl Session {
    fn new(in_order: bool) -> Self {
        Self {
            in_order,
            next_internal: 0,
            statements: Vec::new(),
            implicit_deps: Vec::new(),
            outstanding: Vec::new(),
        }
    }

    fn node_id(&mut self, sync_point: Option<cl_sync_point_khr>) -> NodeId {
        match sync_point {
            Some(sp) => NodeId::SyncPoint(sp),
            None => {
                let id = self.next_internal;
                self.next_internal += 1;
                NodeId::Internal(id)
            }
        }
    }

    fn command(
        &mut self,
        cmd: &str,
        tag: &str,
        wait_list: &[cl_sync_point_khr],
        sync_point: Option<cl_sync_point_khr>,
    ) {
        let id = self.node_id(sync_point);
        let label = if tag.is_empty() {
            cmd.to_string()
        } else {
            format!("{cmd}( {tag} )")
        };
        self.statements.push(Statement::Command { id, label });

        for &sp in wait_list {
            self.statements.push(Statement::Edge {
                from: NodeId::SyncPoint(sp),
                to: id,
                kind: EdgeKind::Explicit,
            });
        }

        let implicit = mem::take(&mut self.implicit_deps);
        for &dep in &implicit {
            self.statements.push(Statement::Edge {
                from: dep,
                to: id,
                kind: EdgeKind::Implicit,
            });
        }

        if self.in_order {
            // The new command becomes the sole implicit predecessor.
            self.implicit_deps.push(id);
        } else {
            // Out-of-order commands stay unordered until a barrier.
            self.implicit_deps = implicit;
            self.outstanding.push(id);
        }
    }

    fn barrier(
        &mut self,
        cmd: &str,
        wait_list: &[cl_sync_point_khr],
        sync_point: Option<cl_sync_point_khr>,
    ) {
        let id = self.node_id(sync_point);
        self.statements.push(Statement::Barrier {
            id,
            label: cmd.to_string(),
        });

        // A barrier with a wait list depends on exactly the named sync
        // points; one without depends on everything not yet ordered.
        if wait_list.is_empty() {
            let outstanding = mem::take(&mut self.outstanding);
            for &dep in &outstanding {
                self.statements.push(Statement::Edge {
                    from: dep,
                    to: id,
                    kind: EdgeKind::Barrier,
                });
            }
        } else {
            for &sp in wait_list {
                self.statements.push(Statement::Edge {
                    from: NodeId::SyncPoint(sp),
                    to: id,
                    kind: EdgeKind::Explicit,
                });
            }
        }

        let implicit = mem::take(&mut self.implicit_deps);
        for &dep in &implicit {
            self.statements.push(Statement::Edge {
                from: dep,
                to: id,
                kind: EdgeKind::Implicit,
            });
        }

        // A barrier is a total order point in both queue modes.
        self.implicit_deps.push(id);
    }

    fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph {\n");
        let _ = writeln!(
            out,
            "  // {} command-buffer",
            if self.in_order { "in-order" } else { "out-of-order" }
        );
        for statement in &self.statements {
            match statement {
                Statement::Command { id, label } => {
                    let _ = writeln!(out, "  {id} [shape=oval, label=\"{label}\"]");
                }
                Statement::Barrier { id, label } => {
                    let _ = writeln!(out, "  {id} [shape=octagon, label=\"{label}\"]");
                }
                Statement::Edge { from, to, kind } => match kind {
                    EdgeKind::Explicit => {
                        let _ = writeln!(out, "  {from} -> {to} // explicit dependency");
                    }
                    EdgeKind::Implicit => {
                        let _ = writeln!(out, "  {from} -> {to} [style=dashed] // implicit dependency");
                    }
                    EdgeKind::Barrier => {
                        let _ = writeln!(out, "  {from} -> {to} [style=dotted] // barrier dependency");
                    }
                },
            }
        }
        out.push_str("}\n");
        out
    }
}

/// All command buffers currently being recorded.
///
/// The session map is only written when a command buffer is created,
/// finalized or destroyed. Recording takes a shared read lock plus the
/// session's own mutex; the latter is uncontended because the wrapped API
/// requires each command buffer to be recorded from one thread at a time.
/// Recording different command buffers on different threads shares nothing.
#[derive(Default)]
pub struct DependencyTracer {
    sessions: RwLock<HashMap<Handle, Mutex<Session>>>,
}

impl DependencyTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a recording session for a freshly created command buffer.
    pub fn create(&self, cmdbuf: Handle, in_order: bool) {
        if cmdbuf.is_null() {
            return;
        }
        let Ok(mut sessions) = self.sessions.write() else {
            return;
        };
        sessions.insert(cmdbuf, Mutex::new(Session::new(in_order)));
    }

    /// Records a command appended to the buffer. Unknown handles are
    /// ignored - the session may have been discarded or never traced.
    pub fn record_command(
        &self,
        cmdbuf: Handle,
        cmd: &str,
        tag: &str,
        wait_list: &[cl_sync_point_khr],
        sync_point: Option<cl_sync_point_khr>,
    ) {
        let Ok(sessions) = self.sessions.read() else {
            return;
        };
        let Some(session) = sessions.get(&cmdbuf) else {
            return;
        };
        let Ok(mut session) = session.lock() else {
            return;
        };
        session.command(cmd, tag, wait_list, sync_point);
    }

    /// Records a barrier appended to the buffer.
    pub fn record_barrier(
        &self,
        cmdbuf: Handle,
        cmd: &str,
        wait_list: &[cl_sync_point_khr],
        sync_point: Option<cl_sync_point_khr>,
    ) {
        let Ok(sessions) = self.sessions.read() else {
            return;
        };
        let Some(session) = sessions.get(&cmdbuf) else {
            return;
        };
        let Ok(mut session) = session.lock() else {
            return;
        };
        session.barrier(cmd, wait_list, sync_point);
    }

    /// Serializes a live recording without sealing it. Pure function of
    /// the calls recorded so far; safe to call repeatedly.
    pub fn serialize(&self, cmdbuf: Handle) -> Option<String> {
        let sessions = self.sessions.read().ok()?;
        let session = sessions.get(&cmdbuf)?;
        let session = session.lock().ok()?;
        Some(session.serialize())
    }

    /// Seals and destroys the session, returning its serialized graph.
    /// Nothing can be recorded against the handle afterwards.
    pub fn finalize(&self, cmdbuf: Handle) -> Option<String> {
        let mut sessions = self.sessions.write().ok()?;
        let session = sessions.remove(&cmdbuf)?;
        let session = session.into_inner().ok()?;
        Some(session.serialize())
    }

    /// Silently drops the session for a command buffer destroyed before
    /// its recording was finalized.
    pub fn discard(&self, cmdbuf: Handle) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(&cmdbuf);
        }
    }
}
