//! Message classification: what is being sent, and where it came from.

use serde::{Deserialize, Serialize};

/// Closed enumeration of outbound message classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MsgType {
    AnnounceBlockHeader,
    RequestBlockHeaders,
    RequestBlocks,
    Transaction,
    Mpc,
}

impl MsgType {
    pub const ALL: [MsgType; 5] = [
        MsgType::AnnounceBlockHeader,
        MsgType::RequestBlockHeaders,
        MsgType::RequestBlocks,
        MsgType::Transaction,
        MsgType::Mpc,
    ];
}

/// Where a message came from: created locally, or received from a peer and
/// being forwarded on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin<N> {
    Sender,
    Forward(N),
}

/// Origin stripped of the carried peer id — the policy engine keys off this,
/// not off *which* peer forwarded the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginKind {
    Sender,
    Forward,
}

impl<N> Origin<N> {
    pub fn kind(&self) -> OriginKind {
        match self {
            Origin::Sender => OriginKind::Sender,
            Origin::Forward(_) => OriginKind::Forward,
        }
    }

    pub fn forwarded_from(&self) -> Option<&N> {
        match self {
            Origin::Sender => None,
            Origin::Forward(n) => Some(n),
        }
    }
}
