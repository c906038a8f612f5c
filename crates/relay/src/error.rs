//! This module defines the various errors raised in the relay.

use flex_error::{define_error, DisplayOnly, TraceError};

use icp_channel::identifier::ChainId;

use tokio_tungstenite::tungstenite;

define_error! {
    #[derive(Debug)]
    Error {
        Io
            [ DisplayOnly<std::io::Error> ]
            | _ | { "I/O error" },

        ConfigIo
            [ DisplayOnly<std::io::Error> ]
            | _ | { "config I/O error" },

        ConfigDecode
            [ TraceError<toml::de::Error> ]
            | _ | { "invalid configuration" },

        ConfigEncode
            [ TraceError<toml::ser::Error> ]
            | _ | { "invalid configuration" },

        InvalidPeerAddress
            { peer: String }
            | e | { format_args!("cannot resolve peer address {0}", e.peer) },

        Connect
            { peer: String }
            [ DisplayOnly<std::io::Error> ]
            | e | { format_args!("failed to connect to peer {0}", e.peer) },

        Handshake
            [ DisplayOnly<tungstenite::Error> ]
            | _ | { "websocket handshake failed" },

        Transport
            [ DisplayOnly<tungstenite::Error> ]
            | _ | { "websocket transport error" },

        Codec
            [ TraceError<codec::Error> ]
            | _ | { "invalid message encoding" },

        BadPayload
            | _ | { "malformed relay message" },

        UnknownTag
            { tag: u32 }
            | e | { format_args!("unknown message tag {0}", e.tag) },

        MisalignedActions
            { names: usize, actions: usize, receipts: usize }
            | e | {
                format_args!(
                    "icp_actions arrays are not index-aligned: {0} names, {1} actions, {2} receipts",
                    e.names, e.actions, e.receipts)
            },

        HelloExpected
            | _ | { "first message from peer must be hello" },

        ChainIdMismatch
            { expected: ChainId, got: ChainId }
            | e | { format_args!("bad peer: wrong chain id {0}, expected {1}", e.got, e.expected) },

        SelfConnect
            | _ | { "connected to self" },

        PingMismatch
            | _ | { "pong code does not match the ping in flight" },

        HeadGap
            { local: u32, got: u32 }
            | e | { format_args!("unlinkable block: has {0}, got {1}", e.local, e.got) },

        ChannelNotOpen
            | _ | { "local fork head not found, maybe the channel is not open" },

        CoordinatorGone
            | _ | { "coordinator channel is closed" },

        SessionClosed
            { id: u64 }
            | e | { format_args!("session {0} is closed", e.id) },

        Chain
            { reason: String }
            | e | { format_args!("chain submission failed: {0}", e.reason) },
    }
}
