//! Token lookup steps

use tracing::info;

use super::{StepArgs, StepContext, StepFuture, StepRegistry};
use crate::assertions::assert_not_empty;
use crate::error::{E2eError, E2eResult};

pub fn register(registry: &mut StepRegistry) -> E2eResult<()> {
    registry.register(
        "the user enters the address {string} in the input address field",
        enter_address,
    )?;
    registry.register("the user clicks the Submit button", click_submit)?;
    registry.register("the page shows the address balance for the selected token", shows_balance)?;
    registry.register(
        "the page shows the table of the deposit history for the selected token",
        shows_deposit_history,
    )?;
    registry.register("the submit button is disabled", submit_disabled)?;
    registry.register("the user clicks the example token link", click_example_token)?;
    Ok(())
}

fn enter_address(ctx: &mut StepContext, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let address = args.string(0)?;
        let app = &ctx.session()?.app;
        app.reload().await?;
        app.enter_token_address(address).await
    })
}

fn click_submit(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { ctx.session()?.app.submit_address().await })
}

fn shows_balance(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let balance = ctx.session()?.app.balance_info().await?;
        info!("Found balance: {}", balance);
        assert_not_empty("token balance", &balance).into_result()
    })
}

fn shows_deposit_history(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let rows = ctx.session()?.app.deposit_history_rows().await?;
        if rows == 0 {
            return Err(E2eError::assertion("deposit history rows", "at least 1", "0"));
        }
        info!("Deposit history has {} rows", rows);
        Ok(())
    })
}

fn submit_disabled(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        if ctx.session()?.app.submit_enabled().await? {
            return Err(E2eError::assertion("submit button state", "disabled", "enabled"));
        }
        Ok(())
    })
}

fn click_example_token(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let app = &ctx.session()?.app;
        app.reload().await?;
        app.click_example_token().await
    })
}
