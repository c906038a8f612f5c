use codec::{Decode, Encode};

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::{PacketReceived, ReceiptWritten};
use crate::handler::verify::verify_icp_action;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::packet::{IcpAction, PacketData, Receipt, ReceiptData, ReceiptStatus};
use crate::timestamp::Expiry;

/// Consumes a proven inbound packet.
///
/// The packet must be carried by a finalized peer block, reconstruct that
/// block's action Merkle root, and continue the incoming cursor exactly.
/// An expired packet is not an error: an `Expired` receipt is recorded in
/// place of execution so the sender can settle it.
pub fn process<Ctx>(ctx: &mut Ctx, action: IcpAction) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    let mut output = HandlerOutput::builder();

    let block_num = verify_icp_action(ctx, &action)?;

    let data = PacketData::decode(&mut action.action_bytes.as_slice()).map_err(Error::codec)?;

    let mut peer = ctx.peer();
    let expected = peer.last_incoming_packet_seq.increment();
    if data.seq != expected {
        return Err(Error::bad_seq(expected, data.seq));
    }

    let (status, payload) = match data.expiration.check_expiry(ctx.host_timestamp()) {
        Expiry::NotExpired => {
            let outcome = ctx.execute_inbound(&data.payload)?;
            (ReceiptStatus::Executed, outcome)
        }
        Expiry::Expired | Expiry::InvalidTimestamp => (ReceiptStatus::Expired, Vec::new()),
    };

    let receipt_seq = peer.last_outgoing_receipt_seq.increment();
    let receipt_data = ReceiptData {
        seq: receipt_seq,
        packet_seq: data.seq,
        status,
        payload: payload.clone(),
    };

    ctx.store_receipt(Receipt {
        seq: receipt_seq,
        packet_seq: data.seq,
        status,
        payload,
        block_num,
    });

    peer.last_incoming_packet_seq = data.seq;
    peer.last_outgoing_receipt_seq = receipt_seq;
    ctx.set_peer(peer);

    output.log(format!("success: packet {} received", data.seq));
    output.emit(PacketReceived {
        seq: data.seq,
        status,
    });
    output.emit(ReceiptWritten {
        seq: receipt_seq,
        data: receipt_data.encode(),
    });

    Ok(output.with_result(()))
}

#[cfg(test)]
mod tests {
    use codec::Encode;
    use test_log::test;

    use crate::context::ChannelReader;
    use crate::error::ErrorDetail;
    use crate::events::ChannelEvent;
    use crate::handler::on_packet::process;
    use crate::mock::MockContext;
    use crate::packet::{PacketData, ReceiptStatus, Sequence};
    use crate::test_utils::{dummy_schedule, dummy_seed, make_action_block};
    use crate::timestamp::Timestamp;

    fn packet_bytes(seq: u64, expiration: Timestamp) -> Vec<u8> {
        PacketData {
            seq: Sequence::from(seq),
            expiration,
            payload: b"transfer".to_vec(),
        }
        .encode()
    }

    #[test]
    fn happy_path_executes_and_receipts() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let expiration = MockContext::default().host_timestamp().plus_seconds(60);
        let block = make_action_block(&seed, &[packet_bytes(1, expiration)]);

        let mut ctx = MockContext::default().with_open_channel(seed);
        ctx.append_peer_header(block.header.clone());

        let output = process(&mut ctx, block.icp_action(0)).unwrap();

        assert!(matches!(
            output.events.as_slice(),
            [ChannelEvent::PacketReceived(_), ChannelEvent::ReceiptWritten(_)]
        ));
        assert_eq!(ctx.peer().last_incoming_packet_seq, Sequence::from(1));
        assert_eq!(ctx.peer().last_outgoing_receipt_seq, Sequence::from(1));
        assert_eq!(ctx.executed().len(), 1);

        let receipt = ctx.receipt(Sequence::from(1)).unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Executed);
        assert_eq!(receipt.packet_seq, Sequence::from(1));
        assert_eq!(receipt.block_num, 101);
    }

    #[test]
    fn sequence_gap_aborts() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let expiration = MockContext::default().host_timestamp().plus_seconds(60);
        let block = make_action_block(&seed, &[packet_bytes(2, expiration)]);

        let mut ctx = MockContext::default().with_open_channel(seed);
        ctx.append_peer_header(block.header.clone());

        let err = process(&mut ctx, block.icp_action(0)).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::BadSeq(_)));
        assert!(ctx.executed().is_empty());
        assert_eq!(ctx.peer().last_incoming_packet_seq, Sequence::from(0));
    }

    #[test]
    fn expired_packet_records_expired_receipt() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let expiration = MockContext::default().host_timestamp();
        let block = make_action_block(&seed, &[packet_bytes(1, expiration)]);

        let mut ctx = MockContext::default().with_open_channel(seed);
        ctx.append_peer_header(block.header.clone());

        process(&mut ctx, block.icp_action(0)).unwrap();

        // Not executed, but the cursor and receipt both advance.
        assert!(ctx.executed().is_empty());
        let receipt = ctx.receipt(Sequence::from(1)).unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Expired);
        assert!(receipt.payload.is_empty());
        assert_eq!(ctx.peer().last_incoming_packet_seq, Sequence::from(1));
    }

    #[test]
    fn contiguous_sequence_accumulates() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let expiration = MockContext::default().host_timestamp().plus_seconds(60);

        let mut ctx = MockContext::default().with_open_channel(seed.clone());
        let mut tip = seed;

        for seq in 1..=3u64 {
            let block = make_action_block(&tip, &[packet_bytes(seq, expiration)]);
            tip = ctx.append_peer_header(block.header.clone());
            process(&mut ctx, block.icp_action(0)).unwrap();
        }

        assert_eq!(ctx.peer().last_incoming_packet_seq, Sequence::from(3));
        assert_eq!(ctx.executed().len(), 3);
    }
}
