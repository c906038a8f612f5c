use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::ReceiptsPruned;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::packet::Sequence;

/// Owner-gated mass delete of old receipts.
///
/// Unlike `cleanup` this tolerates holes, but it never reaches past the
/// irreversibility watermark: a receipt written for a block the peer could
/// still revert stays put.
pub fn process<Ctx>(ctx: &mut Ctx, start: Sequence, end: Sequence) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    if !ctx.owner_authorized() {
        return Err(Error::unauthorized());
    }
    if start > end || start.is_zero() {
        return Err(Error::non_contiguous(start));
    }

    let lib = ctx.fork_store().lib();

    let mut output = HandlerOutput::builder();
    let mut pruned = 0usize;

    for value in start.value()..=end.value() {
        let seq = Sequence::from(value);
        if let Some(receipt) = ctx.receipt(seq) {
            if receipt.block_num > lib {
                return Err(Error::block_not_irreversible(receipt.block_num, lib));
            }
            ctx.remove_receipt(seq);
            pruned += 1;
        }
    }

    output.log(format!("success: {pruned} receipts pruned"));
    output.emit(ReceiptsPruned { start, end });

    Ok(output.with_result(()))
}
