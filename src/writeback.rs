//! Deferred write-back of child streams.
//!
//! Serializing a structure whose header carries lengths or offsets of
//! variable-size children is a chicken-and-egg problem: the header cannot
//! be finished until the children are sized, and the children cannot be
//! placed until the header is written. The write path resolves it by
//! serializing children into their own sub-streams, registering each on
//! its parent together with a [`WriteBackHandler`], and patching
//! everything in one depth-first pass once the outermost structure is
//! done.
//!
//! The child list is a plain ordered container owned by the parent; the
//! flush recursion carries the parent downward, so no upward links exist.

use crate::error::{OxiBinError, Result};
use crate::stream::Stream;
use log::trace;
use std::fmt;

/// Callback that patches deferred bytes into a parent stream.
///
/// Invoked with the parent (already positioned at the handler's anchor)
/// and the now fully materialized child stream.
pub type WriteBackFn = Box<dyn FnOnce(&mut Stream, &mut Stream) -> Result<()>>;

/// An anchor position paired with a deferred patch callback.
///
/// Typically the callback writes a child's final bytes, or a length or
/// offset prefix computed from them, into the parent at the anchor.
pub struct WriteBackHandler {
    pos: u64,
    handler: WriteBackFn,
}

impl WriteBackHandler {
    /// Create a handler that will seek the parent to `pos` and run `handler`.
    pub fn new<F>(pos: u64, handler: F) -> Self
    where
        F: FnOnce(&mut Stream, &mut Stream) -> Result<()> + 'static,
    {
        Self {
            pos,
            handler: Box::new(handler),
        }
    }

    /// The anchor position in the parent stream.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub(crate) fn write_back(self, parent: &mut Stream, child: &mut Stream) -> Result<()> {
        parent.seek(self.pos)?;
        (self.handler)(parent, child)
    }
}

impl fmt::Debug for WriteBackHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBackHandler")
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

impl Stream {
    /// Install the handler that will patch this stream's deferred bytes
    /// into its parent during the write-back pass.
    pub fn set_write_back_handler(&mut self, handler: WriteBackHandler) {
        self.write_back = Some(handler);
    }

    /// Register a child stream created while serializing a sub-structure.
    ///
    /// Insertion order determines write-back order.
    pub fn add_child_stream(&mut self, child: Stream) {
        self.children.push(child);
    }

    /// Flush the whole child-stream tree of this root stream.
    ///
    /// Children are processed depth-first in insertion order, so
    /// grandchildren are patched into their parents before those parents
    /// are patched upward in turn; sizes computed at each level therefore
    /// see fully materialized subtrees. The saved position of every
    /// stream is restored after its children are flushed.
    pub fn write_back_child_streams(&mut self) -> Result<()> {
        self.write_back_into(None)
    }

    fn write_back_into(&mut self, parent: Option<&mut Stream>) -> Result<()> {
        let saved = self.pos();
        let children = std::mem::take(&mut self.children);
        if !children.is_empty() {
            trace!("writing back {} child stream(s)", children.len());
        }
        for mut child in children {
            child.write_back_into(Some(self))?;
        }
        self.seek(saved)?;
        if let Some(parent) = parent {
            match self.write_back.take() {
                Some(handler) => handler.write_back(parent, self)?,
                None => {
                    return Err(OxiBinError::invalid_argument(
                        "child stream flushed without a write-back handler",
                    ))
                }
            }
        }
        Ok(())
    }
}
