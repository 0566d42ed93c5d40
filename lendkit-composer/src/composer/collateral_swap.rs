use lendkit_common::{
    flash_loan::FlashLoanRequest,
    models::{money_bag::MoneyBag, BPS_BASE},
};
use tracing::instrument;

use super::{
    clamp_to_available, composed, ensure_supply, exceeded_supply_cap, full_balance_bps,
    rejected, requested_amount, supply_operations, withdraw_operations, Action, ActionOutput,
    ActionParams, AmountField, Composer, ErrorCode, OperationError,
};
use crate::errors::ComposerError;

impl Composer {
    /// Moves collateral from `src_asset` into `dest_asset` within the same market.
    ///
    /// A flash loan of the source asset is swapped into the destination asset and supplied; the
    /// source collateral is then withdrawn to settle the loan. `src_amount` is the collateral
    /// withdrawn, `dest_amount` the collateral supplied.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn collateral_swap(
        &self,
        params: ActionParams<'_>,
    ) -> Result<ActionOutput, ComposerError> {
        let action = Action::CollateralSwap;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };
        ensure_supply(portfolio, &params.src_asset)?;
        ensure_supply(portfolio, &params.dest_asset)?;

        let available = portfolio.max_withdraw_amount(&params.src_asset);
        let (src_amount, requested, shortfall) =
            clamp_to_available(src_amount, requested, available);
        if let Some(error) = shortfall.filter(|_| requested.is_zero()) {
            return Ok(rejected(action, portfolio.clone(), "0".to_string(), error));
        }

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        // The withdraw settles the loan and may come out a few wei short.
        let settled = src_amount.saturating_sub_wei(self.config.withdraw_slack_wei());
        let flash_loan = self
            .quote_flash_loan(
                portfolio.chain(),
                FlashLoanRequest::Repays(MoneyBag::from_instances([&settled])?),
            )
            .await?;
        let loan = flash_loan.loan(&params.src_asset)?;
        let swap = self
            .quote_exact_in(&loan, &params.dest_asset, slippage_bps)
            .await?;
        let dest_amount = swap.output.clone();

        let mut after = portfolio.clone();
        after.withdraw(&params.src_asset, requested);
        let supplied = dest_amount.to_decimal()?;
        let capped = exceeded_supply_cap(portfolio, &params.dest_asset, supplied);
        after.supply(&params.dest_asset, capped.unwrap_or(supplied));
        let violation = shortfall
            .or_else(|| {
                capped.map(|_| {
                    OperationError::new(AmountField::DestAmount, ErrorCode::SupplyCapExceeded)
                })
            })
            .or_else(|| self.check_health(&after));
        if let Some(error) = violation {
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }

        let (flash_loan_operation, flash_repay_operation) = flash_loan.operations().await?;
        let mut operations = vec![flash_loan_operation];
        operations.extend(swap.operation(params.account).await?);
        operations.extend(
            supply_operations(
                protocol.as_ref(),
                portfolio,
                params.account,
                dest_amount.clone(),
                Some(BPS_BASE),
            )
            .await?,
        );
        operations.extend(
            withdraw_operations(
                protocol.as_ref(),
                portfolio,
                params.account,
                src_amount,
                full_balance_bps(requested, available),
            )
            .await?,
        );
        operations.push(flash_repay_operation);

        Ok(composed(action, after, &dest_amount, operations))
    }
}
