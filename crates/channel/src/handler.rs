//! Handler dispatch and the accumulated handler output.

use core::marker::PhantomData;

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::ChannelEvent;
use crate::identifier::AccountId;
use crate::msgs::ChannelMsg;

pub mod add_block;
pub mod cleanup;
pub mod close_channel;
pub mod gen_proof;
pub mod on_cleanup;
pub mod on_packet;
pub mod on_receipt;
pub mod open_channel;
pub mod prune;
pub mod send_action;
pub mod verify;

pub type HandlerResult<T, E> = Result<HandlerOutput<T>, E>;

/// Result of a handler: a value, accumulated log lines, and the events the
/// host publishes on commit.
#[derive(Clone, Debug)]
pub struct HandlerOutput<T> {
    pub result: T,
    pub log: Vec<String>,
    pub events: Vec<ChannelEvent>,
}

impl<T> HandlerOutput<T> {
    pub fn builder() -> HandlerOutputBuilder<T> {
        HandlerOutputBuilder::new()
    }
}

#[derive(Clone, Debug, Default)]
pub struct HandlerOutputBuilder<T> {
    log: Vec<String>,
    events: Vec<ChannelEvent>,
    marker: PhantomData<T>,
}

impl<T> HandlerOutputBuilder<T> {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            events: Vec::new(),
            marker: PhantomData,
        }
    }

    pub fn log(&mut self, log: impl Into<String>) {
        self.log.push(log.into());
    }

    pub fn emit(&mut self, event: impl Into<ChannelEvent>) {
        self.events.push(event.into());
    }

    pub fn with_result(self, result: T) -> HandlerOutput<T> {
        HandlerOutput {
            result,
            log: self.log,
            events: self.events,
        }
    }
}

/// Delivers one message with transactional semantics: the mutation is staged
/// on a clone of the context and committed only when the handler succeeds,
/// so an error leaves no partial state behind — the same guarantee the host
/// chain gives the deployed contract.
pub fn deliver<Ctx>(ctx: &mut Ctx, msg: ChannelMsg) -> Result<HandlerOutput<()>, Error>
where
    Ctx: ChannelKeeper + Clone,
{
    let mut staged = ctx.clone();
    let output = dispatch(&mut staged, msg)?;
    *ctx = staged;
    Ok(output)
}

/// Routes one message to its handler.
pub fn dispatch<Ctx>(ctx: &mut Ctx, msg: ChannelMsg) -> Result<HandlerOutput<()>, Error>
where
    Ctx: ChannelKeeper,
{
    match msg {
        ChannelMsg::SetPeer { peer } => set_peer(ctx, peer),
        ChannelMsg::SetMaxPackets { max } => set_max_packets(ctx, max),
        ChannelMsg::SetMaxBlocks { max } => set_max_blocks(ctx, max),
        ChannelMsg::OpenChannel { seed } => open_channel::process(ctx, seed),
        ChannelMsg::CloseChannel => close_channel::process(ctx),
        ChannelMsg::AddBlock { header } => add_block::process_single(ctx, header),
        ChannelMsg::AddBlocks { batch } => add_block::process_batch(ctx, batch),
        ChannelMsg::SendAction {
            seq,
            send_action,
            expiration,
            receipt_action,
        } => send_action::process(ctx, seq, send_action, expiration, receipt_action),
        ChannelMsg::OnPacket { action } => on_packet::process(ctx, action),
        ChannelMsg::OnReceipt { action } => on_receipt::process(ctx, action),
        ChannelMsg::OnCleanup { action } => on_cleanup::process(ctx, action),
        ChannelMsg::Cleanup { start, end } => cleanup::process(ctx, start, end),
        ChannelMsg::GenProof {
            packet_seq,
            receipt_seq,
        } => gen_proof::process(&*ctx, packet_seq, receipt_seq),
        ChannelMsg::Prune { start, end } => prune::process(ctx, start, end),
    }
}

fn set_peer<Ctx: ChannelKeeper>(ctx: &mut Ctx, peer: AccountId) -> Result<HandlerOutput<()>, Error> {
    if !ctx.owner_authorized() {
        return Err(Error::unauthorized());
    }
    let mut record = ctx.peer();
    record.peer_contract = Some(peer);
    ctx.set_peer(record);
    Ok(HandlerOutput::builder().with_result(()))
}

fn set_max_packets<Ctx: ChannelKeeper>(ctx: &mut Ctx, max: u32) -> Result<HandlerOutput<()>, Error> {
    if !ctx.owner_authorized() {
        return Err(Error::unauthorized());
    }
    let mut meter = ctx.meter();
    meter.max_packets = max;
    ctx.set_meter(meter);
    Ok(HandlerOutput::builder().with_result(()))
}

fn set_max_blocks<Ctx: ChannelKeeper>(ctx: &mut Ctx, max: u32) -> Result<HandlerOutput<()>, Error> {
    if !ctx.owner_authorized() {
        return Err(Error::unauthorized());
    }
    ctx.fork_store_mut().set_max_blocks(max);
    Ok(HandlerOutput::builder().with_result(()))
}
