use flex_error::{define_error, TraceError};

use crate::header::BlockId;
use crate::identifier::AccountId;
use crate::packet::Sequence;

define_error! {
    #[derive(Debug)]
    Error {
        InvalidIdentifier
            { id: String }
            | e | { format_args!("identifier {0} is malformed", e.id) },

        AlreadyOpen
            | _ | { "channel is already open" },

        NotOpen
            | _ | { "channel is not open" },

        Unauthorized
            | _ | { "missing contract owner authority" },

        Unlinkable
            { block_id: BlockId }
            | e | { format_args!("unlinkable block: previous {0} not in store", e.block_id) },

        BadBlockNum
            { expected: u32, got: u32 }
            | e | { format_args!("block number {0} does not extend {1}", e.got, e.expected) },

        BadSchedule
            { version: u32 }
            | e | { format_args!("producer schedule version {0} is not adoptable", e.version) },

        UnknownProducer
            { producer: AccountId }
            | e | { format_args!("producer {0} is not in the active schedule", e.producer) },

        EmptyBatch
            | _ | { "header batch is empty" },

        BadSeq
            { expected: Sequence, got: Sequence }
            | e | { format_args!("sequence {0} does not follow cursor, expected {1}", e.got, e.expected) },

        RateLimited
            { max: u32 }
            | e | { format_args!("packet table is saturated at {0} unreceipted packets", e.max) },

        MeterUnderflow
            | _ | { "meter has no unreceipted packets to release" },

        BlockNotFound
            { block_id: BlockId }
            | e | { format_args!("block {0} not found in fork store", e.block_id) },

        BlockNotIrreversible
            { block_num: u32, lib: u32 }
            | e | {
                format_args!(
                    "block {0} is above the last irreversible block {1}",
                    e.block_num, e.lib)
            },

        BadMerkleProof
            { block_id: BlockId }
            | e | { format_args!("digests do not reconstruct the action merkle root of block {0}", e.block_id) },

        ActionMismatch
            | _ | { "receipt does not bind the carried action" },

        EmptyAction
            | _ | { "send action payload is empty" },

        PacketNotFound
            { seq: Sequence }
            | e | { format_args!("no packet stored under sequence {0}", e.seq) },

        ReceiptNotFound
            { seq: Sequence }
            | e | { format_args!("no receipt stored under sequence {0}", e.seq) },

        NonContiguous
            { seq: Sequence }
            | e | { format_args!("cleanup range breaks at sequence {0}", e.seq) },

        Codec
            [ TraceError<codec::Error> ]
            | _ | { "invalid encoding" },
    }
}
