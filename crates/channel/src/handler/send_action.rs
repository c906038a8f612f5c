use codec::Encode;

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::PacketSent;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::packet::{Packet, PacketData, PacketStatus, Sequence};
use crate::timestamp::Timestamp;

/// Originates an outbound packet.
///
/// The caller supplies the sequence it expects; anything but the cursor
/// successor is rejected, which keeps concurrent senders from silently
/// interleaving. When saturated, the meter fails the send rather than
/// queueing.
pub fn process<Ctx>(
    ctx: &mut Ctx,
    seq: Sequence,
    send_action: Vec<u8>,
    expiration: Timestamp,
    receipt_action: Vec<u8>,
) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    if !ctx.fork_store().is_open() {
        return Err(Error::not_open());
    }
    if send_action.is_empty() {
        return Err(Error::empty_action());
    }

    let mut peer = ctx.peer();
    let expected = peer.last_outgoing_packet_seq.increment();
    if seq != expected {
        return Err(Error::bad_seq(expected, seq));
    }

    let mut meter = ctx.meter();
    meter.add()?;

    let mut output = HandlerOutput::builder();

    let data = PacketData {
        seq,
        expiration,
        payload: send_action.clone(),
    }
    .encode();

    ctx.store_packet(Packet {
        seq,
        expiration,
        send_action,
        receipt_action,
        status: PacketStatus::Unreceipted,
        receipt_seq: None,
    });

    peer.last_outgoing_packet_seq = seq;
    ctx.set_peer(peer);
    ctx.set_meter(meter);

    output.log(format!("success: packet {seq} sent"));
    output.emit(PacketSent { seq, data });

    Ok(output.with_result(()))
}
