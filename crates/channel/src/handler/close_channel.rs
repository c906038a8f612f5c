use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::ChannelEvent;
use crate::handler::{HandlerOutput, HandlerResult};

/// Tears the channel down: fork store, packets, receipts, meter and peer
/// record are all cleared. Owner-gated and irreversible.
pub fn process<Ctx>(ctx: &mut Ctx) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    if !ctx.owner_authorized() {
        return Err(Error::unauthorized());
    }

    let mut output = HandlerOutput::builder();

    ctx.clear_channel();

    output.log("success: channel closed");
    output.emit(ChannelEvent::ChannelClosed);

    Ok(output.with_result(()))
}

#[cfg(test)]
mod tests {
    use crate::context::ChannelReader;
    use crate::error::ErrorDetail;
    use crate::handler::close_channel::process;
    use crate::mock::MockContext;
    use crate::test_utils::{dummy_schedule, dummy_seed};

    #[test]
    fn close_clears_everything() {
        let mut ctx = MockContext::default()
            .with_open_channel(dummy_seed(10, dummy_schedule(1)))
            .with_max_packets(4);

        process(&mut ctx).unwrap();

        assert!(!ctx.fork_store().is_open());
        assert!(ctx.packets().is_empty());
        assert_eq!(ctx.meter().current_packets, 0);
    }

    #[test]
    fn close_requires_owner() {
        let mut ctx = MockContext::default()
            .with_open_channel(dummy_seed(10, dummy_schedule(1)))
            .with_owner_auth(false);

        let err = process(&mut ctx).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::Unauthorized(_)));
        assert!(ctx.fork_store().is_open());
    }
}
