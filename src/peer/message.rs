use bytes::Bytes;

/// A block of a piece, identified by its offset and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRequest {
    pub piece: u32,
    pub offset: u32,
    pub length: u32,
}

impl BlockRequest {
    pub fn new(piece: u32, offset: u32, length: u32) -> Self {
        Self {
            piece,
            offset,
            length,
        }
    }
}

/// A peer wire message waiting in a connection's outbound queue.
///
/// Encoding is the connection layer's job; the choker only inserts control
/// messages and rewrites queued piece uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece: u32 },
    Bitfield(Bytes),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, data: Bytes },
    Cancel { index: u32, begin: u32, length: u32 },
    // Fast extension
    Suggest { piece: u32 },
    HaveAll,
    HaveNone,
    Reject { index: u32, begin: u32, length: u32 },
    AllowedFast { piece: u32 },
}

impl Message {
    pub fn is_piece(&self) -> bool {
        matches!(self, Message::Piece { .. })
    }

    pub fn reject(request: &BlockRequest) -> Self {
        Message::Reject {
            index: request.piece,
            begin: request.offset,
            length: request.length,
        }
    }

    /// Returns the block a queued piece upload answers.
    pub fn piece_request(&self) -> Option<BlockRequest> {
        match self {
            Message::Piece { index, begin, data } => {
                Some(BlockRequest::new(*index, *begin, data.len() as u32))
            }
            _ => None,
        }
    }
}
