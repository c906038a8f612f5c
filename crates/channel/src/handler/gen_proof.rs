use codec::Encode;

use crate::context::ChannelReader;
use crate::error::Error;
use crate::events::{PacketSent, ReceiptWritten};
use crate::handler::{HandlerOutput, HandlerResult};
use crate::packet::{PacketData, ReceiptData, Sequence};

/// Re-emits the canonical bytes of a stored packet and/or receipt, for a
/// relay that lost the original inline action. A zero sequence skips that
/// side. Reads only; business state is untouched.
pub fn process<Ctx>(
    ctx: &Ctx,
    packet_seq: Sequence,
    receipt_seq: Sequence,
) -> HandlerResult<(), Error>
where
    Ctx: ChannelReader,
{
    let mut output = HandlerOutput::builder();

    if !packet_seq.is_zero() {
        let packet = ctx
            .packet(packet_seq)
            .ok_or_else(|| Error::packet_not_found(packet_seq))?;
        let data = PacketData {
            seq: packet.seq,
            expiration: packet.expiration,
            payload: packet.send_action,
        }
        .encode();
        output.log(format!("proof regenerated for packet {packet_seq}"));
        output.emit(PacketSent {
            seq: packet_seq,
            data,
        });
    }

    if !receipt_seq.is_zero() {
        let receipt = ctx
            .receipt(receipt_seq)
            .ok_or_else(|| Error::receipt_not_found(receipt_seq))?;
        let data = ReceiptData {
            seq: receipt.seq,
            packet_seq: receipt.packet_seq,
            status: receipt.status,
            payload: receipt.payload,
        }
        .encode();
        output.log(format!("proof regenerated for receipt {receipt_seq}"));
        output.emit(ReceiptWritten {
            seq: receipt_seq,
            data,
        });
    }

    Ok(output.with_result(()))
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorDetail;
    use crate::events::ChannelEvent;
    use crate::handler::gen_proof::process;
    use crate::handler::send_action;
    use crate::mock::MockContext;
    use crate::packet::{Receipt, ReceiptStatus, Sequence};
    use crate::test_utils::{dummy_schedule, dummy_seed};
    use crate::timestamp::Timestamp;

    #[test]
    fn reemits_stored_rows() {
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
        ctx.insert_receipt(Receipt {
            seq: Sequence::from(1),
            packet_seq: Sequence::from(1),
            status: ReceiptStatus::Executed,
            payload: b"done".to_vec(),
            block_num: 100,
        });

        let output = process(&ctx, Sequence::from(1), Sequence::from(1)).unwrap();
        assert!(matches!(
            output.events.as_slice(),
            [ChannelEvent::PacketSent(_), ChannelEvent::ReceiptWritten(_)]
        ));

        // A zero sequence skips that side.
        let output = process(&ctx, Sequence::from(1), Sequence::from(0)).unwrap();
        assert_eq!(output.events.len(), 1);
    }

    #[test]
    fn missing_rows_fail() {
        let ctx = MockContext::default().with_open_channel(dummy_seed(100, dummy_schedule(1)));

        let err = process(&ctx, Sequence::from(7), Sequence::from(0)).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::PacketNotFound(_)));

        let err = process(&ctx, Sequence::from(0), Sequence::from(7)).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::ReceiptNotFound(_)));
    }
}
