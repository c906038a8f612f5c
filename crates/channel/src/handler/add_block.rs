use codec::Decode;

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::BlockAppended;
use crate::fork::AddOutcome;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::header::{BlockHeader, BlockHeaderWithMerklePath};

/// Appends a single peer header. A duplicate header is an idempotent
/// success and emits nothing.
pub fn process_single<Ctx>(ctx: &mut Ctx, header: Vec<u8>) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    let mut output = HandlerOutput::builder();

    let header = BlockHeader::decode(&mut header.as_slice()).map_err(Error::codec)?;
    let (block_id, block_num) = (header.id(), header.block_num);

    match ctx.fork_store_mut().add_header(header)? {
        AddOutcome::Added => {
            let lib = ctx.fork_store().lib();
            output.log(format!("success: block {block_num} appended"));
            output.emit(BlockAppended {
                block_id,
                block_num,
                lib,
            });
        }
        AddOutcome::Duplicate => {
            output.log(format!("block {block_num} already known"));
        }
    }

    Ok(output.with_result(()))
}

/// Appends a catch-up batch. The first header must extend the current head
/// by exactly one; an unlinkable batch fails atomically.
pub fn process_batch<Ctx>(ctx: &mut Ctx, batch: Vec<u8>) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    let mut output = HandlerOutput::builder();

    let batch = BlockHeaderWithMerklePath::decode(&mut batch.as_slice()).map_err(Error::codec)?;
    let headers = batch.into_headers();

    ctx.fork_store_mut().add_header_batch(headers)?;

    let head = ctx.fork_store().head_state()?;
    let appended = BlockAppended {
        block_id: head.id,
        block_num: head.block_num,
        lib: ctx.fork_store().lib(),
    };

    output.log(format!("success: head advanced to block {}", appended.block_num));
    output.emit(appended);

    Ok(output.with_result(()))
}

#[cfg(test)]
mod tests {
    use codec::Encode;

    use crate::context::ChannelReader;
    use crate::error::ErrorDetail;
    use crate::handler::add_block::{process_batch, process_single};
    use crate::header::BlockHeaderWithMerklePath;
    use crate::mock::MockContext;
    use crate::test_utils::{dummy_schedule, dummy_seed, make_chain};

    #[test]
    fn single_block_extends_head() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let chain = make_chain(&seed, 1);
        let mut ctx = MockContext::default().with_open_channel(seed);

        process_single(&mut ctx, chain[0].encode()).unwrap();
        assert_eq!(ctx.fork_store().lib(), 101);

        // Idempotent on replay.
        let output = process_single(&mut ctx, chain[0].encode()).unwrap();
        assert!(output.events.is_empty());
    }

    #[test]
    fn batch_with_connecting_path() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let mut chain = make_chain(&seed, 4);
        let mut ctx = MockContext::default().with_open_channel(seed);

        let tip = chain.pop().unwrap();
        let batch = BlockHeaderWithMerklePath {
            block_header: tip,
            merkle_path: chain,
        };
        assert_eq!(batch.first_block_num(), 101);

        process_batch(&mut ctx, batch.encode()).unwrap();
        assert_eq!(ctx.fork_store().head_state().unwrap().block_num, 104);
    }

    #[test]
    fn gapped_batch_is_rejected_atomically() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let chain = make_chain(&seed, 4);
        let mut ctx = MockContext::default().with_open_channel(seed);

        // Drop the connecting header: 102 cannot follow head 100.
        let batch = BlockHeaderWithMerklePath {
            block_header: chain[3].clone(),
            merkle_path: chain[1..3].to_vec(),
        };

        let err = process_batch(&mut ctx, batch.encode()).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::BadBlockNum(_)));
        assert_eq!(ctx.fork_store().head_state().unwrap().block_num, 100);
    }

    #[test]
    fn closed_channel_accepts_nothing() {
        let seed = dummy_seed(100, dummy_schedule(1));
        let chain = make_chain(&seed, 1);
        let mut ctx = MockContext::default();

        let err = process_single(&mut ctx, chain[0].encode()).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::NotOpen(_)));
    }
}
