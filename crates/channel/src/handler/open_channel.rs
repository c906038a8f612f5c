use codec::Decode;

use crate::context::ChannelKeeper;
use crate::error::Error;
use crate::events::ChannelOpened;
use crate::handler::{HandlerOutput, HandlerResult};
use crate::header::BlockHeaderState;

/// Installs a trusted [`BlockHeaderState`] as the channel seed: the sole
/// fork store entry, head and lib at once.
pub fn process<Ctx>(ctx: &mut Ctx, seed: Vec<u8>) -> HandlerResult<(), Error>
where
    Ctx: ChannelKeeper,
{
    let mut output = HandlerOutput::builder();

    let state = BlockHeaderState::decode(&mut seed.as_slice()).map_err(Error::codec)?;
    let (block_id, block_num) = (state.id, state.block_num);

    ctx.fork_store_mut().init(state)?;

    output.log("success: channel open");
    output.emit(ChannelOpened { block_id, block_num });

    Ok(output.with_result(()))
}
