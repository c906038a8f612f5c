//! End-to-end channel flows across two in-memory chains.
//!
//! Chain A and chain B each run a channel contract whose fork store tracks
//! the *other* chain. The test plays the relay: it scrapes the canonical
//! bytes out of handler events, wraps them into blocks on the originating
//! chain, and proves them to the peer contract.

use codec::Encode;

use icp_channel::context::ChannelReader;
use icp_channel::error::ErrorDetail;
use icp_channel::events::ChannelEvent;
use icp_channel::handler::{deliver, HandlerOutput};
use icp_channel::header::BlockHeaderState;
use icp_channel::mock::MockContext;
use icp_channel::msgs::ChannelMsg;
use icp_channel::packet::{PacketStatus, Sequence};
use icp_channel::test_utils::{dummy_schedule, dummy_seed, make_action_block, ActionBlock};
use icp_channel::timestamp::Timestamp;

/// One side of the link: the local contract plus the local chain's tip as
/// the test (playing block producer) extends it.
struct Side {
    ctx: MockContext,
    chain_tip: BlockHeaderState,
}

fn setup() -> (Side, Side) {
    let seed_a = dummy_seed(100, dummy_schedule(1));
    let seed_b = dummy_seed(500, dummy_schedule(1));

    let side_a = Side {
        ctx: MockContext::default().with_open_channel(seed_b.clone()),
        chain_tip: seed_a.clone(),
    };
    let side_b = Side {
        ctx: MockContext::default().with_open_channel(seed_a),
        chain_tip: seed_b,
    };
    (side_a, side_b)
}

/// Produces a block on `origin`'s chain carrying the given canonical action
/// bytes, and proves it to the peer contract: `addblock` followed by the
/// given peer action for each carried payload.
fn relay_actions(
    origin: &mut Side,
    peer: &mut Side,
    payloads: &[Vec<u8>],
    make_msg: impl Fn(icp_channel::packet::IcpAction) -> ChannelMsg,
) -> Vec<HandlerOutput<()>> {
    let block: ActionBlock = make_action_block(&origin.chain_tip, payloads);
    origin.chain_tip = origin
        .chain_tip
        .next(block.header.clone())
        .expect("origin chain extension");

    let mut outputs = vec![deliver(
        &mut peer.ctx,
        ChannelMsg::AddBlock {
            header: block.header.encode(),
        },
    )
    .expect("addblock")];

    for i in 0..payloads.len() {
        outputs.push(
            deliver(&mut peer.ctx, make_msg(block.icp_action(i))).expect("peer action"),
        );
    }
    outputs
}

fn sent_packet_data(output: &HandlerOutput<()>) -> Vec<u8> {
    output
        .events
        .iter()
        .find_map(|ev| match ev {
            ChannelEvent::PacketSent(ev) => Some(ev.data.clone()),
            _ => None,
        })
        .expect("no PacketSent event")
}

fn written_receipt_data(outputs: &[HandlerOutput<()>]) -> Vec<u8> {
    outputs
        .iter()
        .flat_map(|o| o.events.iter())
        .find_map(|ev| match ev {
            ChannelEvent::ReceiptWritten(ev) => Some(ev.data.clone()),
            _ => None,
        })
        .expect("no ReceiptWritten event")
}

fn cleaned_receipt_data(output: &HandlerOutput<()>) -> Vec<u8> {
    output
        .events
        .iter()
        .find_map(|ev| match ev {
            ChannelEvent::ReceiptsCleaned(ev) => Some(ev.data.clone()),
            _ => None,
        })
        .expect("no ReceiptsCleaned event")
}

fn send_packet(side: &mut Side, seq: u64, expiration: Timestamp) -> Vec<u8> {
    let output = deliver(
        &mut side.ctx,
        ChannelMsg::SendAction {
            seq: Sequence::from(seq),
            send_action: b"transfer 10 tokens".to_vec(),
            expiration,
            receipt_action: b"settle transfer".to_vec(),
        },
    )
    .expect("sendaction");
    sent_packet_data(&output)
}

#[test]
fn happy_path_round_trip() {
    let (mut a, mut b) = setup();
    let expiration = a.ctx.host_timestamp().plus_seconds(60);

    // A originates packet 1.
    let packet_data = send_packet(&mut a, 1, expiration);
    assert_eq!(a.ctx.meter().current_packets, 1);

    // Relay ships it to B, which executes and writes receipt 1.
    let outputs = relay_actions(&mut a, &mut b, &[packet_data], |action| {
        ChannelMsg::OnPacket { action }
    });
    assert_eq!(b.ctx.peer().last_incoming_packet_seq, Sequence::from(1));
    assert_eq!(b.ctx.executed().len(), 1);

    // Relay mirrors the receipt back to A.
    let receipt_data = written_receipt_data(&outputs);
    relay_actions(&mut b, &mut a, &[receipt_data], |action| {
        ChannelMsg::OnReceipt { action }
    });

    // A's packet is settled and the meter is back at its pre-send value.
    let packet = a.ctx.packet(Sequence::from(1)).expect("packet retained");
    assert_eq!(packet.status, PacketStatus::Receipted);
    assert_eq!(a.ctx.meter().current_packets, 0);
    assert_eq!(a.ctx.peer().last_incoming_receipt_seq, Sequence::from(1));
    assert_eq!(a.ctx.receipt_calls().len(), 1);
}

#[test]
fn out_of_order_packet_aborts_atomically() {
    let (mut a, mut b) = setup();
    let expiration = a.ctx.host_timestamp().plus_seconds(60);

    // Packets 1 and 2 are committed on A's chain, but the relay tries to
    // deliver packet 2 first.
    let data_1 = send_packet(&mut a, 1, expiration);
    let data_2 = send_packet(&mut a, 2, expiration);

    let block = make_action_block(&a.chain_tip, &[data_1, data_2]);
    a.chain_tip = a.chain_tip.next(block.header.clone()).unwrap();

    deliver(
        &mut b.ctx,
        ChannelMsg::AddBlock {
            header: block.header.encode(),
        },
    )
    .unwrap();

    let before = b.ctx.peer();
    let err = deliver(
        &mut b.ctx,
        ChannelMsg::OnPacket {
            action: block.icp_action(1),
        },
    )
    .unwrap_err();

    assert!(matches!(err.detail(), ErrorDetail::BadSeq(_)));
    assert_eq!(b.ctx.peer(), before);
    assert!(b.ctx.executed().is_empty());

    // In order both go through.
    deliver(&mut b.ctx, ChannelMsg::OnPacket { action: block.icp_action(0) }).unwrap();
    deliver(&mut b.ctx, ChannelMsg::OnPacket { action: block.icp_action(1) }).unwrap();
    assert_eq!(b.ctx.peer().last_incoming_packet_seq, Sequence::from(2));
}

#[test]
fn expired_packet_settles_without_execution() {
    let (mut a, mut b) = setup();

    // The packet expires the moment it is born: B's clock already reached
    // the expiration when the proof arrives.
    let expiration = b.ctx.host_timestamp();
    let packet_data = send_packet(&mut a, 1, expiration);

    let outputs = relay_actions(&mut a, &mut b, &[packet_data], |action| {
        ChannelMsg::OnPacket { action }
    });

    // B recorded an expired receipt instead of executing.
    assert!(b.ctx.executed().is_empty());
    assert_eq!(b.ctx.peer().last_incoming_packet_seq, Sequence::from(1));

    let receipt_data = written_receipt_data(&outputs);
    relay_actions(&mut b, &mut a, &[receipt_data], |action| {
        ChannelMsg::OnReceipt { action }
    });

    let packet = a.ctx.packet(Sequence::from(1)).expect("packet retained");
    assert_eq!(packet.status, PacketStatus::Expired);
    assert_eq!(a.ctx.meter().current_packets, 0);
}

#[test]
fn cleanup_propagates_to_sender() {
    let (mut a, mut b) = setup();
    let expiration = a.ctx.host_timestamp().plus_seconds(60);

    // Full round trip for packet 1.
    let packet_data = send_packet(&mut a, 1, expiration);
    let outputs = relay_actions(&mut a, &mut b, &[packet_data], |action| {
        ChannelMsg::OnPacket { action }
    });
    let receipt_data = written_receipt_data(&outputs);
    relay_actions(&mut b, &mut a, &[receipt_data], |action| {
        ChannelMsg::OnReceipt { action }
    });

    // B cleans its receipt table; the proven cleanup erases A's packet.
    let output = deliver(
        &mut b.ctx,
        ChannelMsg::Cleanup {
            start: Sequence::from(1),
            end: Sequence::from(1),
        },
    )
    .expect("cleanup");
    assert!(b.ctx.oldest_receipt_seq().is_none());

    let cleanup_data = cleaned_receipt_data(&output);
    relay_actions(&mut b, &mut a, &[cleanup_data], |action| {
        ChannelMsg::OnCleanup { action }
    });

    assert!(a.ctx.packet(Sequence::from(1)).is_none());
}

#[test]
fn rate_limit_round_trip_restores_capacity() {
    let (mut a, mut b) = setup();
    a.ctx = a.ctx.with_max_packets(2);
    let expiration = a.ctx.host_timestamp().plus_seconds(60);

    let data_1 = send_packet(&mut a, 1, expiration);
    let _data_2 = send_packet(&mut a, 2, expiration);

    // Saturated: the third send fails.
    let err = deliver(
        &mut a.ctx,
        ChannelMsg::SendAction {
            seq: Sequence::from(3),
            send_action: b"transfer".to_vec(),
            expiration,
            receipt_action: b"settle".to_vec(),
        },
    )
    .unwrap_err();
    assert!(matches!(err.detail(), ErrorDetail::RateLimited(_)));

    // Settling packet 1 drains one slot; the next send goes through.
    let outputs = relay_actions(&mut a, &mut b, &[data_1], |action| ChannelMsg::OnPacket {
        action,
    });
    let receipt_data = written_receipt_data(&outputs);
    relay_actions(&mut b, &mut a, &[receipt_data], |action| {
        ChannelMsg::OnReceipt { action }
    });
    assert_eq!(a.ctx.meter().current_packets, 1);

    send_packet(&mut a, 3, expiration);
    assert_eq!(a.ctx.meter().current_packets, 2);
}
