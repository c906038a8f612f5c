use codec::Decode;

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::PacketsErased;
use crate::handler::verify::verify_icp_action;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::packet::{CleanupData, IcpAction};

/// Handles the peer's proven receipt cleanup: the receipts in the range will
/// never be referenced again, so the local packets they settled can be
/// erased for good.
pub fn process<Ctx>(ctx: &mut Ctx, action: IcpAction) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    let mut output = HandlerOutput::builder();

    verify_icp_action(ctx, &action)?;

    let data = CleanupData::decode(&mut action.action_bytes.as_slice()).map_err(Error::codec)?;
    if data.start_seq > data.end_seq {
        return Err(Error::non_contiguous(data.start_seq));
    }

    let mut erased = 0usize;
    for packet in ctx.packets() {
        let settled_in_range = packet
            .receipt_seq
            .map(|seq| data.start_seq <= seq && seq <= data.end_seq)
            .unwrap_or(false);
        if settled_in_range && packet.is_terminal() {
            ctx.remove_packet(packet.seq);
            erased += 1;
        }
    }

    output.log(format!("success: {erased} settled packets erased"));
    output.emit(PacketsErased {
        start: data.start_seq,
        end: data.end_seq,
    });

    Ok(output.with_result(()))
}
