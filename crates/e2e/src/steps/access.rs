//! Bootstrap, page access and wallet connection steps

use tracing::info;

use super::{StepArgs, StepContext, StepFuture, StepRegistry};
use crate::assertions::{assert_address_eq, assert_contains, assert_hidden, assert_text_eq, assert_visible};
use crate::error::E2eResult;

/// Banner the dApp shows while the wallet is on an unsupported network
pub const NETWORK_ERROR_TEXT: &str =
    "It seems like your MetaMask plugin is not present or the network chain is not already configured";

/// Label of the dApp's switch-network button
pub const SWITCH_NETWORK_LABEL: &str = "Connect Metamask to Sepolia";

pub fn register(registry: &mut StepRegistry) -> E2eResult<()> {
    registry.register("A user with metamask installed connected to {string} network", bootstrap)?;
    registry.register("the user accesses the app page", access_app_page)?;
    registry.register("the user accepts notifications", accept_notifications)?;
    registry.register("the page shows the account address", shows_account_address)?;
    registry.register("the page shows the input address field", shows_input_address)?;
    registry.register("the page doesn't show the input address field", hides_input_address)?;
    registry.register("the page doesn't show a network error message", hides_network_error)?;
    registry.register("the page shows a network error message", shows_network_error)?;
    registry.register("the page shows the switch network button", shows_switch_network)?;
    registry.register("the user clicks the switch network button", click_switch_network)?;
    registry.register("the user confirms the switch network", confirm_switch_network)?;
    Ok(())
}

fn bootstrap(ctx: &mut StepContext, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let network = args.string(0)?.to_string();
        ctx.bootstrap(&network).await
    })
}

fn access_app_page(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        let url = session.config().app_url.clone();
        session.tabs.focus(session.app.page().tab()).await?;
        session.app.open(&url).await
    })
}

fn accept_notifications(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        session.wallet.grant_connection().await?;
        Ok(())
    })
}

fn shows_account_address(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        let expected = session.app.provider_account().await?;
        info!("Wallet account: {}", expected);

        session.app.reload().await?;
        let displayed = session.app.connected_address().await?;
        info!("Displayed account: {}", displayed);

        assert_address_eq("connected address", &expected, &displayed).into_result()
    })
}

fn shows_input_address(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let app = &ctx.session()?.app;
        app.wait_for_address_input().await?;
        assert_visible("input address field", app.address_input_visible().await?).into_result()
    })
}

fn hides_input_address(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let app = &ctx.session()?.app;
        assert_hidden("input address field", app.address_input_hidden().await?).into_result()
    })
}

fn hides_network_error(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let app = &ctx.session()?.app;
        assert_hidden("network error message", app.network_error_absent().await?).into_result()
    })
}

fn shows_network_error(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        session.focus_application().await?;
        session.app.reload().await?;

        let banner = session.app.network_error_text().await?;
        assert_contains("network error message", NETWORK_ERROR_TEXT, &banner).into_result()
    })
}

fn shows_switch_network(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let app = &ctx.session()?.app;
        let label = app.switch_network_label().await?;
        assert_text_eq("switch network button", SWITCH_NETWORK_LABEL, label.trim()).into_result()
    })
}

fn click_switch_network(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let app = &ctx.session()?.app;
        app.reload().await?;
        app.click_switch_network().await
    })
}

fn confirm_switch_network(ctx: &mut StepContext, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let session = ctx.session()?;
        session.wallet.confirm_network_switch(&session.app).await?;
        Ok(())
    })
}
