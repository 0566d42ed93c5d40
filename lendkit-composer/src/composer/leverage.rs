use lendkit_common::{
    flash_loan::FlashLoanRequest,
    models::{money_bag::MoneyBag, BPS_BASE},
};
use tracing::instrument;

use super::{
    borrow_operation, check_borrow_min, composed, delivered, ensure_borrow, ensure_supply,
    exceeded_supply_cap, rejected, requested_amount, supply_operations, Action, ActionOutput,
    ActionParams, AmountField, Composer, ErrorCode, OperationError,
};
use crate::errors::ComposerError;

impl Composer {
    /// Adds `src_amount` of `src_asset` collateral financed by `dest_asset` debt.
    ///
    /// The debt asset is flash-borrowed and swapped into `src_amount` collateral, which is supplied;
    /// the loan is settled by borrowing the debt asset. `dest_amount` is the new debt.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn leverage_by_collateral(
        &self,
        params: ActionParams<'_>,
    ) -> Result<ActionOutput, ComposerError> {
        let action = Action::LeverageByCollateral;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };
        ensure_supply(portfolio, &params.src_asset)?;
        ensure_borrow(portfolio, &params.dest_asset)?;

        let mut after = portfolio.clone();
        if let Some(headroom) = exceeded_supply_cap(portfolio, &params.src_asset, requested) {
            after.supply(&params.src_asset, headroom);
            let error = OperationError::new(AmountField::SrcAmount, ErrorCode::SupplyCapExceeded);
            return Ok(rejected(action, after, "0".to_string(), error));
        }

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let swap = self
            .quote_exact_out(&params.dest_asset, &src_amount, slippage_bps)
            .await?;
        let flash_loan = self
            .quote_flash_loan(
                portfolio.chain(),
                FlashLoanRequest::Loans(MoneyBag::from_instances([&swap.input])?),
            )
            .await?;
        let dest_amount = flash_loan.repay(&params.dest_asset)?;
        let supplied = delivered(&swap, &src_amount);

        after.supply(&params.src_asset, supplied.to_decimal()?);
        after.borrow(&params.dest_asset, dest_amount.to_decimal()?);
        let violation = check_borrow_min(&after, &params.dest_asset, AmountField::DestAmount)
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
                supplied,
                Some(BPS_BASE),
            )
            .await?,
        );
        operations.push(
            borrow_operation(
                protocol.as_ref(),
                portfolio,
                params.account,
                dest_amount.clone(),
                params.interest_rate_mode,
            )
            .await?,
        );
        operations.push(flash_repay_operation);

        Ok(composed(action, after, &dest_amount, operations))
    }

    /// Borrows `src_amount` of `src_asset` and adds the swapped proceeds as `dest_asset`
    /// collateral.
    ///
    /// The flash loan is sized so that repaying it costs exactly `src_amount`, which the borrow
    /// then covers. `dest_amount` is the collateral supplied.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn leverage_by_debt(
        &self,
        params: ActionParams<'_>,
    ) -> Result<ActionOutput, ComposerError> {
        let action = Action::LeverageByDebt;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };
        ensure_borrow(portfolio, &params.src_asset)?;
        ensure_supply(portfolio, &params.dest_asset)?;

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let flash_loan = self
            .quote_flash_loan(
                portfolio.chain(),
                FlashLoanRequest::Repays(MoneyBag::from_instances([&src_amount])?),
            )
            .await?;
        let loan = flash_loan.loan(&params.src_asset)?;
        let swap = self
            .quote_exact_in(&loan, &params.dest_asset, slippage_bps)
            .await?;
        let dest_amount = swap.output.clone();

        let mut after = portfolio.clone();
        after.borrow(&params.src_asset, requested);
        let supplied = dest_amount.to_decimal()?;
        if let Some(headroom) = exceeded_supply_cap(portfolio, &params.dest_asset, supplied) {
            after.supply(&params.dest_asset, headroom);
            let error = OperationError::new(AmountField::DestAmount, ErrorCode::SupplyCapExceeded);
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }
        after.supply(&params.dest_asset, supplied);
        let violation = check_borrow_min(&after, &params.src_asset, AmountField::SrcAmount)
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
        operations.push(
            borrow_operation(
                protocol.as_ref(),
                portfolio,
                params.account,
                src_amount,
                params.interest_rate_mode,
            )
            .await?,
        );
        operations.push(flash_repay_operation);

        Ok(composed(action, after, &dest_amount, operations))
    }
}
