use lendkit_common::{models::BPS_BASE, operation::Operation};
use tracing::instrument;

use super::{
    borrow_operation, check_borrow_min, clamp_to_available, composed, delivered, ensure_borrow,
    ensure_supply, exceeded_supply_cap, full_balance_bps, rejected, repay_operation,
    requested_amount, supply_operations, withdraw_operations, Action, ActionOutput, ActionParams,
    AmountField, Composer, ErrorCode, OperationError,
};
use crate::errors::ComposerError;

impl Composer {
    /// Supplies `dest_asset` paid for with `src_amount` of `src_asset` from the account's wallet.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn zap_supply(&self, params: ActionParams<'_>) -> Result<ActionOutput, ComposerError> {
        let action = Action::ZapSupply;
        let portfolio = params.portfolio;
        let Some((src_amount, _)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };
        ensure_supply(portfolio, &params.dest_asset)?;

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let swap = self
            .quote_exact_in(&src_amount, &params.dest_asset, slippage_bps)
            .await?;
        let dest_amount = swap.output.clone();

        let mut after = portfolio.clone();
        let supplied = dest_amount.to_decimal()?;
        if let Some(headroom) = exceeded_supply_cap(portfolio, &params.dest_asset, supplied) {
            after.supply(&params.dest_asset, headroom);
            let error = OperationError::new(AmountField::DestAmount, ErrorCode::SupplyCapExceeded);
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }
        after.supply(&params.dest_asset, supplied);

        let swap_operation = swap.operation(params.account).await?;
        // A swapped amount is only known at execution time.
        let balance_bps = swap_operation
            .as_ref()
            .map(|_| BPS_BASE);
        let mut operations = vec![Operation::pull_funds(params.account, &src_amount)];
        operations.extend(swap_operation);
        operations.extend(
            supply_operations(
                protocol.as_ref(),
                portfolio,
                params.account,
                dest_amount.clone(),
                balance_bps,
            )
            .await?,
        );

        Ok(composed(action, after, &dest_amount, operations))
    }

    /// Withdraws `src_amount` of `src_asset` collateral and hands it out as `dest_asset`.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn zap_withdraw(
        &self,
        params: ActionParams<'_>,
    ) -> Result<ActionOutput, ComposerError> {
        let action = Action::ZapWithdraw;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };

        ensure_supply(portfolio, &params.src_asset)?;

        let available = portfolio.max_withdraw_amount(&params.src_asset);
        let (src_amount, requested, shortfall) =
            clamp_to_available(src_amount, requested, available);
        if let Some(error) = shortfall.filter(|_| requested.is_zero()) {
            return Ok(rejected(action, portfolio.clone(), "0".to_string(), error));
        }

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let swap_input = self.withdrawn_for_swap(&src_amount, &params.dest_asset);
        let swap = self
            .quote_exact_in(&swap_input, &params.dest_asset, slippage_bps)
            .await?;
        let dest_amount = swap.output.clone();

        let mut after = portfolio.clone();
        after.withdraw(&params.src_asset, requested);
        if let Some(error) = shortfall.or_else(|| self.check_health(&after)) {
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }

        let mut operations = withdraw_operations(
            protocol.as_ref(),
            portfolio,
            params.account,
            src_amount,
            full_balance_bps(requested, available),
        )
        .await?;
        operations.extend(swap.operation(params.account).await?);
        operations.push(Operation::return_funds(params.account, &dest_amount));

        Ok(composed(action, after, &dest_amount, operations))
    }

    /// Borrows `src_amount` of `src_asset` and hands it out as `dest_asset`.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn zap_borrow(&self, params: ActionParams<'_>) -> Result<ActionOutput, ComposerError> {
        let action = Action::ZapBorrow;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };
        ensure_borrow(portfolio, &params.src_asset)?;

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let swap = self
            .quote_exact_in(&src_amount, &params.dest_asset, slippage_bps)
            .await?;
        let dest_amount = swap.output.clone();

        let mut after = portfolio.clone();
        after.borrow(&params.src_asset, requested);
        let violation = check_borrow_min(&after, &params.src_asset, AmountField::SrcAmount)
            .or_else(|| self.check_health(&after));
        if let Some(error) = violation {
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }

        let mut operations = vec![
            borrow_operation(
                protocol.as_ref(),
                portfolio,
                params.account,
                src_amount,
                params.interest_rate_mode,
            )
            .await?,
        ];
        operations.extend(swap.operation(params.account).await?);
        operations.push(Operation::return_funds(params.account, &dest_amount));

        Ok(composed(action, after, &dest_amount, operations))
    }

    /// Repays `src_amount` of `src_asset` debt paid for with `dest_asset` from the account's
    /// wallet. `dest_amount` is what the account pays.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn zap_repay(&self, params: ActionParams<'_>) -> Result<ActionOutput, ComposerError> {
        let action = Action::ZapRepay;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };

        ensure_borrow(portfolio, &params.src_asset)?;

        let debt = portfolio.max_repay_amount(&params.src_asset);
        let (src_amount, requested, shortfall) = clamp_to_available(src_amount, requested, debt);
        if let Some(error) = shortfall.filter(|_| requested.is_zero()) {
            return Ok(rejected(action, portfolio.clone(), "0".to_string(), error));
        }

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let target = self.repay_target(&src_amount, &params.dest_asset);
        let swap = self
            .quote_exact_out(&params.dest_asset, &target, slippage_bps)
            .await?;
        let dest_amount = swap.input.clone();
        let repaid = delivered(&swap, &src_amount);
        let repaid_value = repaid.to_decimal()?;

        let mut after = portfolio.clone();
        after.repay(&params.src_asset, repaid_value);
        let violation = shortfall
            .or_else(|| check_borrow_min(&after, &params.src_asset, AmountField::SrcAmount));
        if let Some(error) = violation {
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }

        let mut operations = vec![Operation::pull_funds(params.account, &dest_amount)];
        operations.extend(swap.operation(params.account).await?);
        operations.push(
            repay_operation(
                protocol.as_ref(),
                portfolio,
                params.account,
                repaid,
                params.interest_rate_mode,
                full_balance_bps(repaid_value, debt),
            )
            .await?,
        );

        Ok(composed(action, after, &dest_amount, operations))
    }
}
