use codec::Decode;

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::PacketReceipted;
use crate::handler::verify::verify_icp_action;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::packet::{IcpAction, PacketStatus, ReceiptData, ReceiptStatus};

/// Settles a local packet against its proven peer receipt.
///
/// The receipt must continue the incoming receipt cursor; the packet it
/// references flips to its terminal status, the meter releases one slot,
/// and the receipt action the sender attached runs inline.
pub fn process<Ctx>(ctx: &mut Ctx, action: IcpAction) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    let mut output = HandlerOutput::builder();

    verify_icp_action(ctx, &action)?;

    let data = ReceiptData::decode(&mut action.action_bytes.as_slice()).map_err(Error::codec)?;

    let mut peer = ctx.peer();
    let expected = peer.last_incoming_receipt_seq.increment();
    if data.seq != expected {
        return Err(Error::bad_seq(expected, data.seq));
    }

    let mut packet = ctx
        .packet(data.packet_seq)
        .ok_or_else(|| Error::packet_not_found(data.packet_seq))?;

    packet.status = match data.status {
        ReceiptStatus::Executed => PacketStatus::Receipted,
        ReceiptStatus::Expired => PacketStatus::Expired,
    };
    packet.receipt_seq = Some(data.seq);

    let mut meter = ctx.meter();
    meter.remove()?;

    ctx.execute_receipt(&packet.receipt_action, &data)?;

    let packet_seq = packet.seq;
    ctx.store_packet(packet);
    ctx.set_meter(meter);

    peer.last_incoming_receipt_seq = data.seq;
    ctx.set_peer(peer);

    output.log(format!("success: packet {packet_seq} receipted"));
    output.emit(PacketReceipted {
        packet_seq,
        status: data.status,
    });

    Ok(output.with_result(()))
}

#[cfg(test)]
mod tests {
    use codec::Encode;

    use crate::context::ChannelReader;
    use crate::error::ErrorDetail;
    use crate::handler::on_receipt::process;
    use crate::handler::send_action;
    use crate::mock::MockContext;
    use crate::packet::{PacketStatus, ReceiptData, ReceiptStatus, Sequence};
    use crate::test_utils::{dummy_schedule, dummy_seed, make_action_block};
    use crate::timestamp::Timestamp;

    fn ctx_with_sent_packet() -> MockContext {
        let mut ctx =
            MockContext::default().with_open_channel(dummy_seed(100, dummy_schedule(1)));
        send_action::process(
            &mut ctx,
            Sequence::from(1),
            b"transfer".to_vec(),
            Timestamp::from_unix_seconds(2_000_000_000),
            b"settle".to_vec(),
        )
        .unwrap();
        ctx
    }

    fn receipt_bytes(seq: u64, packet_seq: u64, status: ReceiptStatus) -> Vec<u8> {
        ReceiptData {
            seq: Sequence::from(seq),
            packet_seq: Sequence::from(packet_seq),
            status,
            payload: Vec::new(),
        }
        .encode()
    }

    #[test]
    fn receipt_settles_packet_and_meter() {
        let mut ctx = ctx_with_sent_packet();
        assert_eq!(ctx.meter().current_packets, 1);

        let peer_tip = ctx.peer_tip();
        let block =
            make_action_block(&peer_tip, &[receipt_bytes(1, 1, ReceiptStatus::Executed)]);
        ctx.append_peer_header(block.header.clone());

        process(&mut ctx, block.icp_action(0)).unwrap();

        let packet = ctx.packet(Sequence::from(1)).unwrap();
        assert_eq!(packet.status, PacketStatus::Receipted);
        assert_eq!(packet.receipt_seq, Some(Sequence::from(1)));
        assert_eq!(ctx.meter().current_packets, 0);
        assert_eq!(ctx.peer().last_incoming_receipt_seq, Sequence::from(1));
        assert_eq!(ctx.receipt_calls().len(), 1);
    }

    #[test]
    fn expired_receipt_marks_packet_expired() {
        let mut ctx = ctx_with_sent_packet();

        let peer_tip = ctx.peer_tip();
        let block =
            make_action_block(&peer_tip, &[receipt_bytes(1, 1, ReceiptStatus::Expired)]);
        ctx.append_peer_header(block.header.clone());

        process(&mut ctx, block.icp_action(0)).unwrap();

        let packet = ctx.packet(Sequence::from(1)).unwrap();
        assert_eq!(packet.status, PacketStatus::Expired);
        assert_eq!(ctx.meter().current_packets, 0);
    }

    #[test]
    fn receipt_gap_aborts() {
        let mut ctx = ctx_with_sent_packet();

        let peer_tip = ctx.peer_tip();
        let block =
            make_action_block(&peer_tip, &[receipt_bytes(2, 1, ReceiptStatus::Executed)]);
        ctx.append_peer_header(block.header.clone());

        let err = process(&mut ctx, block.icp_action(0)).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::BadSeq(_)));
        assert_eq!(ctx.meter().current_packets, 1);
    }

    #[test]
    fn unknown_packet_aborts() {
        let mut ctx = ctx_with_sent_packet();

        let peer_tip = ctx.peer_tip();
        let block =
            make_action_block(&peer_tip, &[receipt_bytes(1, 9, ReceiptStatus::Executed)]);
        ctx.append_peer_header(block.header.clone());

        let err = process(&mut ctx, block.icp_action(0)).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::PacketNotFound(_)));
    }
}
