use codec::Encode;

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::ReceiptsCleaned;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::packet::{CleanupData, Sequence};

/// Removes local receipts in `[start, end]`.
///
/// The range must start at the oldest stored receipt and cover every
/// sequence in between: receipts are only ever released from the tail, so
/// the peer can treat the emitted range as final. The emitted event carries
/// the canonical cleanup bytes the relay proves to the peer as `oncleanup`.
pub fn process<Ctx>(ctx: &mut Ctx, start: Sequence, end: Sequence) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    if start > end || start.is_zero() {
        return Err(Error::non_contiguous(start));
    }

    let oldest = ctx
        .oldest_receipt_seq()
        .ok_or_else(|| Error::receipt_not_found(start))?;
    if start != oldest {
        return Err(Error::non_contiguous(start));
    }

    for value in start.value()..=end.value() {
        let seq = Sequence::from(value);
        if ctx.receipt(seq).is_none() {
            return Err(Error::non_contiguous(seq));
        }
    }

    let mut output = HandlerOutput::builder();

    for value in start.value()..=end.value() {
        ctx.remove_receipt(Sequence::from(value));
    }

    let data = CleanupData {
        start_seq: start,
        end_seq: end,
    }
    .encode();

    output.log(format!("success: receipts [{start}, {end}] cleaned"));
    output.emit(ReceiptsCleaned { start, end, data });

    Ok(output.with_result(()))
}
