use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use yodel_common::{EndpointId, UserId, YoId};

/// Named partition of the job queue, each with its own concurrency,
/// timeout and attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    Default,
    Sms,
    Callbacks,
    /// Where fan-outs themselves run, so a fan-out waiting on a full queue
    /// never holds a slot its own children need
    Fanout,
    /// Private lane for one sender's very large fan-outs, so they can't
    /// starve everyone else on the default lane
    Sender(UserId),
}

impl Lane {
    /// Name without the sender id, for metrics
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Sms => "sms",
            Self::Callbacks => "callbacks",
            Self::Fanout => "fanout",
            Self::Sender(_) => "sender",
        }
    }
}

impl Display for Lane {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender(user) => write!(f, "sender:{user}"),
            other => f.write_str(other.kind()),
        }
    }
}

/// A unit of delivery work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    /// Deliver a single-recipient Yo to every channel its recipient has
    DispatchYo { yo_id: YoId },

    /// Publish a rendered envelope to one endpoint
    Push {
        yo_id: YoId,
        endpoint: EndpointId,
        envelope: String,
    },

    /// Publish a broadcast to the push-capable children in `children`
    PushPartition { parent: YoId, children: Vec<YoId> },

    Sms {
        yo_id: YoId,
        phone: String,
        body: String,
        /// The one-time introduction sent ahead of a first Yo
        welcome: bool,
        /// Text to send once this one has gone out
        then: Option<String>,
    },

    Callback {
        yo_id: YoId,
        url: String,
        params: Vec<(String, String)>,
    },

    /// Expand a broadcast or group Yo into children and dispatch them
    Fanout { yo_id: YoId },
}

impl Job {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DispatchYo { .. } => "dispatch_yo",
            Self::Push { .. } => "push",
            Self::PushPartition { .. } => "push_partition",
            Self::Sms { .. } => "sms",
            Self::Callback { .. } => "callback",
            Self::Fanout { .. } => "fanout",
        }
    }

    /// The Yo this job works on; the parent for partitions
    pub const fn yo_id(&self) -> YoId {
        match self {
            Self::DispatchYo { yo_id }
            | Self::Push { yo_id, .. }
            | Self::Sms { yo_id, .. }
            | Self::Callback { yo_id, .. }
            | Self::Fanout { yo_id } => *yo_id,
            Self::PushPartition { parent, .. } => *parent,
        }
    }
}
