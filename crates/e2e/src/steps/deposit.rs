//! Deposit steps, spanning the dApp and the wallet's confirmation screens

use tracing::info;

use super::{StepArgs, StepContext, StepFuture, StepRegistry};
use crate::assertions::{assert_balance_eq, assert_balance_reduced, assert_contains, assert_hidden, assert_visible};
use crate::error::{E2eError, E2eResult};

/// Activity label of the deposit transaction
pub const DEPOSIT_KIND: &str = "Deposit";

pub fn register(registry: &mut StepRegistry) -> E2eResult<()> {
    registry.register("the page shows the token balance {string}", shows_token_balance)?;
    registry.register("the deposit input shows an error {string}", shows_deposit_error)?;
    registry.register("the deposit button is {string}", deposit_button_state)?;
    registry.register("the user clicks the Get more tokens link", click_get_more_tokens)?;
    registry.register("the user accepts the transaction", accept_transaction)?;
    registry.register(
        "the user enter the max amount of tokens in the amount field",
        enter_max_amount,
    )?;
    registry.register("the user clicks the deposit button", click_deposit)?;
    registry.register("the user accept sending cap request", accept_spending_cap)?;
    registry.register("the user approve the deposit", approve_deposit)?;
    registry.register("the user cancels the deposit", cancel_deposit)?;
    registry.register("the user switches back to the dApp page", switch_back_to_app)?;
    registry.register(
        "the token balance is lower than before the deposit",
        balance_reduced,
    )?;
    Ok(())
}

fn shows_token_balance(ctx: &mut StepContext, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected = args.string(0)?;
        let displayed = ctx.session()?.app.balance_amount().await?;
        info!("Token balance found: {}", displayed);
        assert_balance_eq(expected, &displayed).into_result()
    })
}

fn shows_deposit_error(ctx: &mut StepContext, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let message = args.string(0)?;
        let shown = ctx.session()?.app.deposit_error().await?;
        assert_contains("deposit error", message, &shown).into_result()
    })
}

fn deposit_button_state(ctx: &mut StepContext, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let app = &ctx.session()?.app;
        match args.string(0)? {
            "visible" => {
                app.wait_for_deposit_button().await?;
                assert_visible("deposit button", app.deposit_button_visible().await?).into_result()
            }
            "not visible" => {
                assert_hidden("deposit button", !app.deposit_button_visible().await?).into_result()
            }
            other => Err(E2eError::InvalidArgument(format!(
                "invalid visibility option '{other}'; use \"visible\" or \"not visible\""
            ))),
        }
    })
}

fn click_get_more_tokens(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { ctx.session()?.app.click_get_more_tokens().await })
}

fn accept_transaction(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { ctx.session()?.wallet.confirm_transaction().await })
}

fn enter_max_amount(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        let balance = session.app.balance_amount().await?;
        info!("Depositing full balance: {}", balance);

        session.app.enter_deposit_amount(balance.trim()).await?;
        session.recorded_balance = Some(balance);
        Ok(())
    })
}

fn click_deposit(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move { ctx.session()?.app.click_deposit().await })
}

fn accept_spending_cap(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.session()?.wallet.confirm_transaction().await?;
        info!("Spending cap request confirmed");
        Ok(())
    })
}

fn approve_deposit(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.session()?.wallet.approve_pending(DEPOSIT_KIND).await?;
        Ok(())
    })
}

fn cancel_deposit(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.session()?.wallet.reject().await?;
        Ok(())
    })
}

fn switch_back_to_app(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        session.focus_application().await?;
        session.settle().await;
        Ok(())
    })
}

fn balance_reduced(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        let before = session.recorded_balance.clone().ok_or_else(|| {
            E2eError::InvalidArgument("no balance was recorded before the deposit".to_string())
        })?;
        let after = session.app.balance_amount().await?;
        info!("Balance before deposit: {}, after: {}", before, after);
        assert_balance_reduced(&before, &after).into_result()
    })
}
