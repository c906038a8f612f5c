//! Proof verification shared by `onpacket`, `onreceipt` and `oncleanup`.

use codec::Decode;

use crate::context::ChannelReader;
use crate::error::Error;
use crate::merkle::{merkle_root, Digest};
use crate::packet::{ActionReceipt, IcpAction};

/// Verifies that a cross-chain action really executed on the peer chain and
/// was finalized, returning the number of the block that carried it.
///
/// Re-orgs of the peer chain cannot reach into the channel: only blocks at
/// or below the recorded last-irreversible number carry valid proofs.
pub fn verify_icp_action<Ctx>(ctx: &Ctx, action: &IcpAction) -> Result<u32, Error>
where
    Ctx: ChannelReader,
{
    let store = ctx.fork_store();

    let state = store
        .find(&action.block_id)
        .ok_or_else(|| Error::block_not_found(action.block_id))?;

    if state.block_num > store.lib() {
        return Err(Error::block_not_irreversible(state.block_num, store.lib()));
    }

    if merkle_root(&action.action_digests) != state.header.action_mroot {
        return Err(Error::bad_merkle_proof(action.block_id));
    }

    let receipt =
        ActionReceipt::decode(&mut action.receipt_bytes.as_slice()).map_err(Error::codec)?;
    if receipt.act_digest != Digest::of(&action.action_bytes) {
        return Err(Error::action_mismatch());
    }

    let receipt_digest = Digest::of(&action.receipt_bytes);
    if !action.action_digests.contains(&receipt_digest) {
        return Err(Error::action_mismatch());
    }

    Ok(state.block_num)
}
